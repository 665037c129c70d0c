//! # Community Fund Binding
//!
//! Typed access to the external lending pool: view functions, unsent write
//! calls, and decoding of the five events it emits.
//!
//! The pool holds all accounting. Nothing here computes fees or limits; the
//! values are read back from the contract as-is.

use std::fmt;

use cfund_protocol::abi::{decode, encode_call, event_topic, AbiError, ParamType, Token};
use cfund_protocol::rpc::{CallRequest, EthClient, Log, Topic, Transport};
use cfund_protocol::{Address, ClientError, TxHash, U256};
use futures::future::try_join_all;

use crate::erc20::{string, uint};

mod sig {
    pub const ADD_MEMBER: &str = "addMember(address,string)";
    pub const DEPOSIT: &str = "deposit(uint256)";
    pub const BORROW: &str = "borrow(uint256)";
    pub const PAY_INSTALLMENT: &str = "payInstallment(uint256)";
    pub const EMERGENCY_WITHDRAW: &str = "emergencyWithdraw(uint256)";
    pub const GET_ALL_MEMBERS: &str = "getAllMembers()";
    pub const MEMBERS: &str = "members(address)";
    pub const TOTAL_FUND: &str = "totalFund()";
    pub const MAX_LOAN: &str = "maxLoan(address)";
    pub const OWNER: &str = "owner()";
    pub const USDT: &str = "usdt()";
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A member record as returned by `members(address)`.
///
/// Amounts are raw token units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub address: Address,
    pub name: String,
    pub deposit: U256,
    pub active_loan: U256,
    pub remaining_loan: U256,
    /// `false` for addresses the contract has never registered, in which
    /// case every other field is zero.
    pub exists: bool,
}

impl Member {
    /// Decodes the flat `(string,uint256,uint256,uint256,bool)` tuple.
    fn decode(address: Address, data: &[u8]) -> Result<Self, ClientError> {
        let mut tokens = decode(
            &[
                ParamType::String,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Bool,
            ],
            data,
        )?
        .into_iter();

        let mut next = || {
            tokens
                .next()
                .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "member field" }))
        };

        let name = string(next()?)?;
        let deposit = uint(next()?)?;
        let active_loan = uint(next()?)?;
        let remaining_loan = uint(next()?)?;
        let exists = next()?
            .into_bool()
            .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "bool" }))?;

        Ok(Self {
            address,
            name,
            deposit,
            active_loan,
            remaining_loan,
            exists,
        })
    }

    /// Whether any part of a loan is still outstanding.
    pub fn has_active_loan(&self) -> bool {
        !self.remaining_loan.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A deployed community fund contract.
#[derive(Clone)]
pub struct CommunityFund<T> {
    client: EthClient<T>,
    address: Address,
}

impl<T: Transport> CommunityFund<T> {
    pub fn new(client: EthClient<T>, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, ClientError> {
        let call = CallRequest::new(self.address, encode_call(signature, args));
        self.client.call(&call).await
    }

    async fn read_one(
        &self,
        signature: &str,
        args: &[Token],
        output: ParamType,
    ) -> Result<Token, ClientError> {
        let data = self.read(signature, args).await?;
        decode(&[output], &data)?
            .pop()
            .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "one output" }))
    }

    async fn read_address(&self, signature: &str) -> Result<Address, ClientError> {
        self.read_one(signature, &[], ParamType::Address)
            .await?
            .into_address()
            .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "address" }))
    }

    /// Tokens currently held by the pool.
    pub async fn total_fund(&self) -> Result<U256, ClientError> {
        uint(self.read_one(sig::TOTAL_FUND, &[], ParamType::Uint(256)).await?)
    }

    /// The most `account` may borrow right now.
    pub async fn max_loan(&self, account: Address) -> Result<U256, ClientError> {
        uint(
            self.read_one(sig::MAX_LOAN, &[Token::Address(account)], ParamType::Uint(256))
                .await?,
        )
    }

    pub async fn owner(&self) -> Result<Address, ClientError> {
        self.read_address(sig::OWNER).await
    }

    /// The stablecoin the pool accepts.
    pub async fn usdt(&self) -> Result<Address, ClientError> {
        self.read_address(sig::USDT).await
    }

    /// Registered member addresses, in registration order.
    pub async fn all_members(&self) -> Result<Vec<Address>, ClientError> {
        let token = self
            .read_one(
                sig::GET_ALL_MEMBERS,
                &[],
                ParamType::Array(Box::new(ParamType::Address)),
            )
            .await?;
        token
            .into_array()
            .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "address[]" }))?
            .into_iter()
            .map(|t| {
                t.into_address()
                    .ok_or(ClientError::Abi(AbiError::UnexpectedToken { expected: "address" }))
            })
            .collect()
    }

    /// The record for `account`. Unregistered addresses come back with
    /// `exists == false`.
    pub async fn member(&self, account: Address) -> Result<Member, ClientError> {
        let data = self.read(sig::MEMBERS, &[Token::Address(account)]).await?;
        Member::decode(account, &data)
    }

    /// Reads every record concurrently. Output order matches `accounts`.
    pub async fn members(&self, accounts: &[Address]) -> Result<Vec<Member>, ClientError> {
        try_join_all(accounts.iter().map(|a| self.member(*a))).await
    }

    // -- writes -------------------------------------------------------------

    pub fn deposit(&self, amount: U256) -> CallRequest {
        self.write(sig::DEPOSIT, &[Token::Uint(amount)])
    }

    pub fn borrow(&self, amount: U256) -> CallRequest {
        self.write(sig::BORROW, &[Token::Uint(amount)])
    }

    pub fn pay_installment(&self, amount: U256) -> CallRequest {
        self.write(sig::PAY_INSTALLMENT, &[Token::Uint(amount)])
    }

    pub fn add_member(&self, user: Address, name: &str) -> CallRequest {
        self.write(
            sig::ADD_MEMBER,
            &[Token::Address(user), Token::String(name.to_string())],
        )
    }

    pub fn emergency_withdraw(&self, amount: U256) -> CallRequest {
        self.write(sig::EMERGENCY_WITHDRAW, &[Token::Uint(amount)])
    }

    fn write(&self, signature: &str, args: &[Token]) -> CallRequest {
        CallRequest::new(self.address, encode_call(signature, args))
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The events the fund contract emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundEventKind {
    Deposit,
    Loan,
    Installment,
    MemberAdded,
    EmergencyWithdraw,
}

impl FundEventKind {
    pub const ALL: [FundEventKind; 5] = [
        FundEventKind::Deposit,
        FundEventKind::Loan,
        FundEventKind::Installment,
        FundEventKind::MemberAdded,
        FundEventKind::EmergencyWithdraw,
    ];

    /// Events that change a single member's balances and are indexed by
    /// that member's address.
    pub const ACCOUNT_SCOPED: [FundEventKind; 3] = [
        FundEventKind::Deposit,
        FundEventKind::Loan,
        FundEventKind::Installment,
    ];

    pub fn signature(self) -> &'static str {
        match self {
            FundEventKind::Deposit => "Deposit(address,uint256,uint256)",
            FundEventKind::Loan => "Loan(address,uint256,uint256)",
            FundEventKind::Installment => "Installment(address,uint256,uint256)",
            FundEventKind::MemberAdded => "MemberAdded(address,string)",
            FundEventKind::EmergencyWithdraw => "EmergencyWithdraw(address,uint256)",
        }
    }

    /// `topic0` for this event.
    pub fn topic(self) -> Topic {
        event_topic(self.signature())
    }

    pub fn from_topic(topic: &Topic) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.topic() == *topic)
    }
}

impl fmt::Display for FundEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FundEventKind::Deposit => "Deposit",
            FundEventKind::Loan => "Loan",
            FundEventKind::Installment => "Installment",
            FundEventKind::MemberAdded => "MemberAdded",
            FundEventKind::EmergencyWithdraw => "EmergencyWithdraw",
        };
        f.write_str(name)
    }
}

/// A decoded fund event. Amounts are raw token units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundEvent {
    Deposit { user: Address, amount: U256, fee: U256 },
    Loan { user: Address, amount: U256, fee: U256 },
    Installment { user: Address, amount: U256, fee: U256 },
    MemberAdded { user: Address, name: String },
    EmergencyWithdraw { owner: Address, amount: U256 },
}

impl FundEvent {
    pub fn kind(&self) -> FundEventKind {
        match self {
            FundEvent::Deposit { .. } => FundEventKind::Deposit,
            FundEvent::Loan { .. } => FundEventKind::Loan,
            FundEvent::Installment { .. } => FundEventKind::Installment,
            FundEvent::MemberAdded { .. } => FundEventKind::MemberAdded,
            FundEvent::EmergencyWithdraw { .. } => FundEventKind::EmergencyWithdraw,
        }
    }

    /// The indexed address (member, or owner for emergency withdrawals).
    pub fn account(&self) -> Address {
        match self {
            FundEvent::Deposit { user, .. }
            | FundEvent::Loan { user, .. }
            | FundEvent::Installment { user, .. }
            | FundEvent::MemberAdded { user, .. } => *user,
            FundEvent::EmergencyWithdraw { owner, .. } => *owner,
        }
    }

    /// Decodes a raw log. `Ok(None)` when `topic0` is not a fund event.
    pub fn decode(log: &Log) -> Result<Option<Self>, AbiError> {
        let Some(kind) = log.topics.first().and_then(FundEventKind::from_topic) else {
            return Ok(None);
        };

        let indexed = log
            .topics
            .get(1)
            .ok_or(AbiError::UnexpectedToken { expected: "indexed address topic" })?;
        let account = Address::from_word(indexed).ok_or_else(|| AbiError::InvalidValue {
            ty: "address",
            word: hex::encode(indexed),
        })?;

        let amount_and_fee = || -> Result<(U256, U256), AbiError> {
            let mut t = decode(&[ParamType::Uint(256), ParamType::Uint(256)], &log.data)?.into_iter();
            match (t.next().and_then(Token::into_uint), t.next().and_then(Token::into_uint)) {
                (Some(amount), Some(fee)) => Ok((amount, fee)),
                _ => Err(AbiError::UnexpectedToken { expected: "uint256,uint256" }),
            }
        };

        let event = match kind {
            FundEventKind::Deposit => {
                let (amount, fee) = amount_and_fee()?;
                FundEvent::Deposit { user: account, amount, fee }
            }
            FundEventKind::Loan => {
                let (amount, fee) = amount_and_fee()?;
                FundEvent::Loan { user: account, amount, fee }
            }
            FundEventKind::Installment => {
                let (amount, fee) = amount_and_fee()?;
                FundEvent::Installment { user: account, amount, fee }
            }
            FundEventKind::MemberAdded => {
                let name = decode(&[ParamType::String], &log.data)?
                    .pop()
                    .and_then(Token::into_string)
                    .ok_or(AbiError::UnexpectedToken { expected: "string" })?;
                FundEvent::MemberAdded { user: account, name }
            }
            FundEventKind::EmergencyWithdraw => {
                let amount = decode(&[ParamType::Uint(256)], &log.data)?
                    .pop()
                    .and_then(Token::into_uint)
                    .ok_or(AbiError::UnexpectedToken { expected: "uint256" })?;
                FundEvent::EmergencyWithdraw { owner: account, amount }
            }
        };
        Ok(Some(event))
    }
}

/// A decoded event with its position on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundLog {
    pub event: FundEvent,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
    pub log_index: Option<u64>,
}

impl FundLog {
    pub fn from_log(log: &Log) -> Result<Option<Self>, AbiError> {
        Ok(FundEvent::decode(log)?.map(|event| FundLog {
            event,
            block_number: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfund_protocol::abi::encode;
    use cfund_protocol::rpc::types::hexser;
    use cfund_protocol::rpc::MockTransport;
    use serde_json::json;

    const FUND: &str = "0x78f2ab39424a7a715d26a7933d7d1a5cc8be67cd";
    const ALICE: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const BOB: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

    fn fund() -> CommunityFund<MockTransport> {
        CommunityFund::new(EthClient::new(MockTransport::new()), FUND.parse().unwrap())
    }

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn log(kind: FundEventKind, account: Address, data: Vec<u8>) -> Log {
        Log {
            address: addr(FUND),
            topics: vec![kind.topic(), account.to_word()],
            data,
            block_number: Some(42),
            transaction_hash: None,
            log_index: Some(3),
            removed: false,
        }
    }

    #[test]
    fn event_topics_match_known_hashes() {
        assert_eq!(
            hex::encode(FundEventKind::Deposit.topic()),
            "90890809c654f11d6e72a28fa60149770a0d11ec6c92319d6ceb2bb0a4ea1a15"
        );
        assert_eq!(
            hex::encode(FundEventKind::MemberAdded.topic()),
            "5660dfedd5f2d238aa153a2c488e927eb29ea0e780d70089f0e90c7409a2079c"
        );
        assert_eq!(
            hex::encode(FundEventKind::EmergencyWithdraw.topic()),
            "5fafa99d0643513820be26656b45130b01e1c03062e1266bf36f88cbd3bd9695"
        );
    }

    #[test]
    fn write_calls_use_fund_selectors() {
        let f = fund();
        let amount = U256::from(1_000_000u64);
        assert_eq!(&f.deposit(amount).data[..4], &[0xb6, 0xb5, 0x5f, 0x25]);
        assert_eq!(&f.borrow(amount).data[..4], &[0xc5, 0xeb, 0xea, 0xec]);
        assert_eq!(&f.pay_installment(amount).data[..4], &[0xe2, 0xf8, 0xa0, 0x17]);
        assert_eq!(&f.emergency_withdraw(amount).data[..4], &[0x53, 0x12, 0xea, 0x8e]);
        assert_eq!(&f.add_member(addr(ALICE), "Alice").data[..4], &[0xc1, 0x27, 0xc2, 0x47]);
        assert_eq!(f.deposit(amount).data.len(), 36);
    }

    #[tokio::test]
    async fn member_record_decoded() {
        let f = fund();
        let ret = encode(&[
            Token::String("Alice".into()),
            Token::Uint(U256::from(50_000_000u64)),
            Token::Uint(U256::from(20_000_000u64)),
            Token::Uint(U256::from(15_000_000u64)),
            Token::Bool(true),
        ]);
        f.client.transport().push("eth_call", json!(hexser::encode_bytes(&ret)));

        let m = f.member(addr(ALICE)).await.unwrap();
        assert_eq!(m.name, "Alice");
        assert_eq!(m.deposit, U256::from(50_000_000u64));
        assert_eq!(m.remaining_loan, U256::from(15_000_000u64));
        assert!(m.exists);
        assert!(m.has_active_loan());
        assert_eq!(m.address, addr(ALICE));
    }

    #[tokio::test]
    async fn all_members_decoded_in_order() {
        let f = fund();
        let ret = encode(&[Token::Array(vec![
            Token::Address(addr(BOB)),
            Token::Address(addr(ALICE)),
        ])]);
        f.client.transport().push("eth_call", json!(hexser::encode_bytes(&ret)));

        assert_eq!(f.all_members().await.unwrap(), vec![addr(BOB), addr(ALICE)]);
    }

    #[tokio::test]
    async fn owner_decoded() {
        let f = fund();
        let ret = encode(&[Token::Address(addr(BOB))]);
        f.client.transport().push("eth_call", json!(hexser::encode_bytes(&ret)));
        assert_eq!(f.owner().await.unwrap(), addr(BOB));
    }

    #[test]
    fn deposit_event_decoded() {
        let data = encode(&[
            Token::Uint(U256::from(10_000_000u64)),
            Token::Uint(U256::from(100_000u64)),
        ]);
        let fl = FundLog::from_log(&log(FundEventKind::Deposit, addr(ALICE), data))
            .unwrap()
            .unwrap();

        assert_eq!(
            fl.event,
            FundEvent::Deposit {
                user: addr(ALICE),
                amount: U256::from(10_000_000u64),
                fee: U256::from(100_000u64),
            }
        );
        assert_eq!(fl.block_number, Some(42));
        assert_eq!(fl.log_index, Some(3));
        assert_eq!(fl.event.account(), addr(ALICE));
    }

    #[test]
    fn member_added_event_decoded() {
        let data = encode(&[Token::String("Bob".into())]);
        let event = FundEvent::decode(&log(FundEventKind::MemberAdded, addr(BOB), data))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            FundEvent::MemberAdded {
                user: addr(BOB),
                name: "Bob".into()
            }
        );
    }

    #[test]
    fn unknown_topic_skipped() {
        let mut l = log(FundEventKind::Loan, addr(ALICE), vec![]);
        l.topics[0] = [0x11; 32];
        assert_eq!(FundEvent::decode(&l).unwrap(), None);
    }

    #[test]
    fn truncated_event_data_rejected() {
        let l = log(FundEventKind::Loan, addr(ALICE), vec![0u8; 32]);
        assert!(FundEvent::decode(&l).is_err());
    }

    #[test]
    fn missing_indexed_topic_rejected() {
        let mut l = log(FundEventKind::Loan, addr(ALICE), vec![0u8; 64]);
        l.topics.truncate(1);
        assert!(FundEvent::decode(&l).is_err());
    }
}
