//! ABI bindings for the deployed contracts and the tokens they move.

use alloy::sol;

sol! {
    /// Uniswap V3 swap router wrapper. Swaps pull DAI from the caller and send WETH9 back.
    #[derive(Debug)]
    interface TokenSwap {
        function swapExactInputSingle(uint256 amountIn) external returns (uint256 amountOut);
        function swapExactOutputSingle(uint256 amountOut, uint256 amountInMaximum) external returns (uint256 amountIn);
        function swapExactInputMultihop(uint256 amountIn) external returns (uint256 amountOut);
        function swapExactOutputMultihop(uint256 amountOut, uint256 amountInMaximum) external returns (uint256 amountIn);

        event swapExactInputSingleEvent(uint256 amountOut);
        event swapExactOutputSingleEvent(uint256 amountIn);
        event swapExactInputMultihopEvent(uint256 amountOut);
        event swapExactOutputMultihopEvent(uint256 amountIn);
    }

    /// Uniswap V3 position manager wrapper. Constructed with the TokenSwap address.
    #[derive(Debug)]
    interface LiquidityManager {
        function mintNewPosition() external returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
        function deposits(uint256 tokenId) external view returns (address owner, uint128 liquidity, address token0, address token1);
        function increaseLiquidityCurrentRange(uint256 tokenId, uint256 amountAdd0, uint256 amountAdd1) external returns (uint128 liquidity, uint256 amount0, uint256 amount1);
        function decreaseLiquidityInHalf(uint256 tokenId) external returns (uint256 amount0, uint256 amount1);

        event PositionMinted(uint256 tokenId);
        event LiquidityIncreased(uint256 liquidity);
        event LiquidityDecreasedByHalf(uint256 amount0, uint256 amount1);
    }

    /// Minimal ERC-20 surface.
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}
