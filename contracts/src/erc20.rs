//! # ERC20 Binding
//!
//! Read calls execute immediately. Write calls are returned as unsent
//! [`CallRequest`]s so the session can attach the sender, dry-run them,
//! and track confirmation in one place.

use cfund_protocol::abi::{decode, encode_call, AbiError, ParamType, Token};
use cfund_protocol::rpc::{CallRequest, EthClient, Transport};
use cfund_protocol::{Address, ClientError, U256};

mod sig {
    pub const APPROVE: &str = "approve(address,uint256)";
    pub const ALLOWANCE: &str = "allowance(address,address)";
    pub const BALANCE_OF: &str = "balanceOf(address)";
    pub const DECIMALS: &str = "decimals()";
    pub const SYMBOL: &str = "symbol()";
    pub const NAME: &str = "name()";
}

/// Token name, symbol and precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A deployed ERC20 token.
#[derive(Clone)]
pub struct Erc20<T> {
    client: EthClient<T>,
    address: Address,
}

impl<T: Transport> Erc20<T> {
    pub fn new(client: EthClient<T>, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read(
        &self,
        signature: &str,
        args: &[Token],
        output: ParamType,
    ) -> Result<Token, ClientError> {
        let call = CallRequest::new(self.address, encode_call(signature, args));
        let data = self.client.call(&call).await?;
        decode(&[output], &data)?
            .pop()
            .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "one output" }))
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, ClientError> {
        let token = self
            .read(sig::BALANCE_OF, &[Token::Address(owner)], ParamType::Uint(256))
            .await?;
        uint(token)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ClientError> {
        let token = self
            .read(
                sig::ALLOWANCE,
                &[Token::Address(owner), Token::Address(spender)],
                ParamType::Uint(256),
            )
            .await?;
        uint(token)
    }

    pub async fn decimals(&self) -> Result<u8, ClientError> {
        let token = self.read(sig::DECIMALS, &[], ParamType::Uint(8)).await?;
        // Uint(8) decoding already rejected anything above 255.
        Ok(uint(token)?.low_u32() as u8)
    }

    pub async fn symbol(&self) -> Result<String, ClientError> {
        let token = self.read(sig::SYMBOL, &[], ParamType::String).await?;
        string(token)
    }

    pub async fn name(&self) -> Result<String, ClientError> {
        let token = self.read(sig::NAME, &[], ParamType::String).await?;
        string(token)
    }

    /// Reads name, symbol and decimals concurrently.
    pub async fn metadata(&self) -> Result<TokenMetadata, ClientError> {
        let (name, symbol, decimals) =
            tokio::try_join!(self.name(), self.symbol(), self.decimals())?;
        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    /// `approve(spender, amount)`, unsent.
    pub fn approve(&self, spender: Address, amount: U256) -> CallRequest {
        CallRequest::new(
            self.address,
            encode_call(sig::APPROVE, &[Token::Address(spender), Token::Uint(amount)]),
        )
    }
}

pub(crate) fn uint(token: Token) -> Result<U256, ClientError> {
    token
        .into_uint()
        .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "uint" }))
}

pub(crate) fn string(token: Token) -> Result<String, ClientError> {
    token
        .into_string()
        .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "string" }))
}
