//! EVM contract ABI definitions
//!
//! Uses alloy's sol! macro for the two contract surfaces the relayer touches:
//! the deposit event emitted by bridge contracts and the mint entry point of
//! the destination token.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Bridge contract (deposit side)
    contract Bridge {
        /// Emitted when a user locks funds to be minted on the destination
        event Deposit(address indexed receiver, uint256 amount);
    }
}

sol! {
    /// Destination token with an operator-restricted mint
    interface MintableToken {
        function mint(address account, uint256 amount) external;
    }
}

/// ABI-encode `mint(account, amount)` calldata
pub fn encode_mint_call(account: Address, amount: U256) -> Bytes {
    MintableToken::mintCall { account, amount }.abi_encode().into()
}
