//! Event extraction from transaction receipts.

use alloy::primitives::Address;
use alloy::rpc::types::{Log, TransactionReceipt};
use alloy::sol_types::SolEvent;

/// Decode the first log in `logs` emitted by `emitter` matching event `E`.
pub fn first_event<E: SolEvent>(logs: &[Log], emitter: Address) -> Option<E> {
    logs.iter()
        .filter(|log| log.address() == emitter)
        .filter(|log| log.topics().first() == Some(&E::SIGNATURE_HASH))
        .find_map(|log| log.log_decode::<E>().ok())
        .map(|decoded| decoded.inner.data)
}

/// Decode the first `E` that `emitter` logged in a receipt.
pub fn find_event<E: SolEvent>(receipt: &TransactionReceipt, emitter: Address) -> Option<E> {
    first_event(receipt.inner.logs(), emitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::bindings::{LiquidityManager, TokenSwap};
    use alloy::primitives::{address, Address, U256};

    fn log_of<E: SolEvent>(emitter: Address, event: &E) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: emitter,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_first_matching_event_wins() {
        let emitter = address!("00000000000000000000000000000000000000aa");
        let logs = vec![
            log_of(
                emitter,
                &TokenSwap::swapExactInputSingleEvent {
                    amountOut: U256::from(7),
                },
            ),
            log_of(emitter, &LiquidityManager::PositionMinted { tokenId: U256::from(42) }),
            log_of(emitter, &LiquidityManager::PositionMinted { tokenId: U256::from(43) }),
        ];

        let minted = first_event::<LiquidityManager::PositionMinted>(&logs, emitter).unwrap();
        assert_eq!(minted.tokenId, U256::from(42));

        let swapped = first_event::<TokenSwap::swapExactInputSingleEvent>(&logs, emitter).unwrap();
        assert_eq!(swapped.amountOut, U256::from(7));
    }

    #[test]
    fn test_same_shape_different_name_not_confused() {
        // Both events carry a single uint256; only the signature hash tells them apart.
        let logs = vec![log_of(
            Address::ZERO,
            &TokenSwap::swapExactInputMultihopEvent {
                amountOut: U256::from(1),
            },
        )];

        assert!(first_event::<TokenSwap::swapExactInputSingleEvent>(&logs, Address::ZERO).is_none());
        assert!(first_event::<TokenSwap::swapExactInputMultihopEvent>(&logs, Address::ZERO).is_some());
    }

    #[test]
    fn test_other_emitter_ignored() {
        let manager = address!("00000000000000000000000000000000000000aa");
        let impostor = address!("00000000000000000000000000000000000000bb");
        let logs = vec![
            log_of(impostor, &LiquidityManager::PositionMinted { tokenId: U256::from(1) }),
            log_of(manager, &LiquidityManager::PositionMinted { tokenId: U256::from(2) }),
        ];

        let minted = first_event::<LiquidityManager::PositionMinted>(&logs, manager).unwrap();
        assert_eq!(minted.tokenId, U256::from(2));
        assert!(first_event::<LiquidityManager::PositionMinted>(&logs[..1], manager).is_none());
    }

    #[test]
    fn test_missing_event() {
        let logs: Vec<Log> = Vec::new();
        assert!(first_event::<LiquidityManager::LiquidityDecreasedByHalf>(&logs, Address::ZERO).is_none());
    }
}
