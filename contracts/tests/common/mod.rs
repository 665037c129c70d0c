//! A simulated chain for integration tests.
//!
//! `FakeChain` answers the JSON-RPC methods the client uses and executes
//! the stablecoin and fund contracts in memory: balances, allowances,
//! membership, loans, receipts and event logs. Writes that the contract
//! would refuse revert with an `Error(string)` payload, both on
//! `eth_estimateGas` and as a failed receipt on `eth_sendTransaction`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cfund_protocol::abi::{decode, encode, encode_call, selector, ParamType, Token};
use cfund_protocol::config::ClientConfig;
use cfund_protocol::rpc::types::hexser;
use cfund_protocol::rpc::{RpcErrorObject, Topic, Transport};
use cfund_protocol::types::keccak256;
use cfund_protocol::{Address, ClientError, U256};
use cfund_contracts::FundEventKind;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Value};

pub const FUND: &str = "0x78F2ab39424A7A715D26A7933D7d1A5cC8be67cd";
pub const TOKEN: &str = "0xB8CE59FC3717ada4C02eaDF9682A9e934F625ebb";
pub const ALICE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const BOB: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const OWNER: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";

pub const CHAIN_ID: u64 = 9745;

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

/// Whole tokens to raw 6-decimal units.
pub fn units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(1_000_000u64)
}

/// Config pointed at the fake deployment with fast receipt polling.
pub fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.network.chain_id = CHAIN_ID;
    config.contracts.fund = addr(FUND);
    config.contracts.token = Some(addr(TOKEN));
    config.transactions.poll_interval_ms = 1;
    config.transactions.timeout_secs = 5;
    config
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct Record {
    pub name: String,
    pub deposit: U256,
    pub active_loan: U256,
    pub remaining_loan: U256,
}

#[derive(Clone)]
pub struct ChainState {
    pub chain_id: u64,
    pub block: u64,
    pub accounts: Vec<Address>,
    pub fund: Address,
    pub token: Address,
    pub owner: Address,
    pub decimals: u8,
    pub symbol: String,
    pub balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    pub members: Vec<Address>,
    pub records: HashMap<Address, Record>,
    /// `maxLoan = deposit * factor - activeLoan`.
    pub loan_factor: u64,
    /// When set, every write reverts with this reason.
    pub force_revert: Option<String>,
    /// When set, `decimals()` reverts.
    pub decimals_broken: bool,
    /// When set, the next mined transaction makes every later `eth_call`
    /// fail as if the node had lost its state.
    pub reads_fail_after_send: bool,
    reads_failing: bool,
    pub receipts: HashMap<String, Value>,
    pub logs: Vec<Value>,
    pub tx_count: u64,
}

impl ChainState {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn total_fund(&self) -> U256 {
        self.balance(self.fund)
    }

    fn max_loan(&self, account: Address) -> U256 {
        match self.records.get(&account) {
            Some(r) => (r.deposit * U256::from(self.loan_factor)).saturating_sub(r.active_loan),
            None => U256::zero(),
        }
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), String> {
        let have = self.balance(from);
        if have < amount {
            return Err("ERC20: transfer amount exceeds balance".into());
        }
        self.balances.insert(from, have - amount);
        let to_balance = self.balance(to);
        self.balances.insert(to, to_balance + amount);
        Ok(())
    }

    fn transfer_from(&mut self, owner: Address, amount: U256) -> Result<(), String> {
        let allowed = self.allowance(owner, self.fund);
        if allowed < amount {
            return Err("ERC20: insufficient allowance".into());
        }
        let fund = self.fund;
        self.transfer(owner, fund, amount)?;
        self.allowances.insert((owner, fund), allowed - amount);
        Ok(())
    }

    fn member(&self, account: Address) -> Result<&Record, String> {
        self.records
            .get(&account)
            .ok_or_else(|| "Not a member".to_string())
    }
}

type EmittedLog = (Vec<Topic>, Vec<u8>);

fn event(kind: FundEventKind, account: Address, data: &[Token]) -> EmittedLog {
    (vec![kind.topic(), account.to_word()], encode(data))
}

fn uint_arg(args: &[u8]) -> Result<U256, String> {
    decode(&[ParamType::Uint(256)], args)
        .map_err(|e| e.to_string())?
        .pop()
        .and_then(Token::into_uint)
        .ok_or_else(|| "bad uint argument".to_string())
}

fn split(data: &[u8]) -> Result<([u8; 4], &[u8]), String> {
    if data.len() < 4 {
        return Err("missing selector".into());
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&data[..4]);
    Ok((sel, &data[4..]))
}

/// Executes a write against `state`, returning the emitted logs.
fn execute(
    state: &mut ChainState,
    from: Address,
    to: Address,
    data: &[u8],
) -> Result<Vec<EmittedLog>, String> {
    if let Some(reason) = &state.force_revert {
        return Err(reason.clone());
    }
    let (sel, args) = split(data)?;

    if to == state.token {
        if sel == selector("approve(address,uint256)") {
            let mut t = decode(&[ParamType::Address, ParamType::Uint(256)], args)
                .map_err(|e| e.to_string())?
                .into_iter();
            let spender = t.next().and_then(Token::into_address).ok_or("spender")?;
            let amount = t.next().and_then(Token::into_uint).ok_or("amount")?;
            state.allowances.insert((from, spender), amount);
            return Ok(Vec::new());
        }
        return Err("unknown token function".into());
    }

    if to != state.fund {
        return Err("no contract at address".into());
    }

    if sel == selector("deposit(uint256)") {
        let amount = uint_arg(args)?;
        state.member(from)?;
        if amount.is_zero() {
            return Err("Amount must be > 0".into());
        }
        state.transfer_from(from, amount)?;
        if let Some(r) = state.records.get_mut(&from) {
            r.deposit += amount;
        }
        Ok(vec![event(
            FundEventKind::Deposit,
            from,
            &[Token::Uint(amount), Token::Uint(U256::zero())],
        )])
    } else if sel == selector("borrow(uint256)") {
        let amount = uint_arg(args)?;
        state.member(from)?;
        if amount > state.max_loan(from) {
            return Err("Exceeds max loan".into());
        }
        if amount > state.total_fund() {
            return Err("Insufficient fund".into());
        }
        let fund = state.fund;
        state.transfer(fund, from, amount)?;
        if let Some(r) = state.records.get_mut(&from) {
            r.active_loan += amount;
            r.remaining_loan += amount;
        }
        Ok(vec![event(
            FundEventKind::Loan,
            from,
            &[Token::Uint(amount), Token::Uint(U256::zero())],
        )])
    } else if sel == selector("payInstallment(uint256)") {
        let amount = uint_arg(args)?;
        let remaining = state.member(from)?.remaining_loan;
        if remaining.is_zero() {
            return Err("No active loan".into());
        }
        if amount > remaining {
            return Err("Amount exceeds loan".into());
        }
        state.transfer_from(from, amount)?;
        if let Some(r) = state.records.get_mut(&from) {
            r.remaining_loan -= amount;
            if r.remaining_loan.is_zero() {
                r.active_loan = U256::zero();
            }
        }
        Ok(vec![event(
            FundEventKind::Installment,
            from,
            &[Token::Uint(amount), Token::Uint(U256::zero())],
        )])
    } else if sel == selector("addMember(address,string)") {
        if from != state.owner {
            return Err("Not owner".into());
        }
        let mut t = decode(&[ParamType::Address, ParamType::String], args)
            .map_err(|e| e.to_string())?
            .into_iter();
        let user = t.next().and_then(Token::into_address).ok_or("user")?;
        let name = t.next().and_then(Token::into_string).ok_or("name")?;
        if state.records.contains_key(&user) {
            return Err("Already member".into());
        }
        state.members.push(user);
        state.records.insert(
            user,
            Record {
                name: name.clone(),
                ..Record::default()
            },
        );
        Ok(vec![event(FundEventKind::MemberAdded, user, &[Token::String(name)])])
    } else if sel == selector("emergencyWithdraw(uint256)") {
        if from != state.owner {
            return Err("Not owner".into());
        }
        let amount = uint_arg(args)?;
        let fund = state.fund;
        state.transfer(fund, from, amount)?;
        Ok(vec![event(
            FundEventKind::EmergencyWithdraw,
            from,
            &[Token::Uint(amount)],
        )])
    } else {
        Err("unknown fund function".into())
    }
}

/// Executes a view call.
fn view(state: &ChainState, to: Address, data: &[u8]) -> Result<Vec<u8>, String> {
    let (sel, args) = split(data)?;
    let address_arg = |args: &[u8]| -> Result<Address, String> {
        decode(&[ParamType::Address], args)
            .map_err(|e| e.to_string())?
            .pop()
            .and_then(Token::into_address)
            .ok_or_else(|| "bad address argument".to_string())
    };

    if to == state.token {
        let out = if sel == selector("balanceOf(address)") {
            Token::Uint(state.balance(address_arg(args)?))
        } else if sel == selector("allowance(address,address)") {
            let mut t = decode(&[ParamType::Address, ParamType::Address], args)
                .map_err(|e| e.to_string())?
                .into_iter();
            let owner = t.next().and_then(Token::into_address).ok_or("owner")?;
            let spender = t.next().and_then(Token::into_address).ok_or("spender")?;
            Token::Uint(state.allowance(owner, spender))
        } else if sel == selector("decimals()") {
            if state.decimals_broken {
                return Err("decimals unavailable".into());
            }
            Token::Uint(U256::from(state.decimals))
        } else if sel == selector("symbol()") {
            Token::String(state.symbol.clone())
        } else if sel == selector("name()") {
            Token::String("Tether USD".into())
        } else {
            return Err("unknown token view".into());
        };
        return Ok(encode(&[out]));
    }

    if to != state.fund {
        // Calls to accounts without code succeed with empty output.
        return Ok(Vec::new());
    }

    let out = if sel == selector("totalFund()") {
        vec![Token::Uint(state.total_fund())]
    } else if sel == selector("maxLoan(address)") {
        vec![Token::Uint(state.max_loan(address_arg(args)?))]
    } else if sel == selector("owner()") {
        vec![Token::Address(state.owner)]
    } else if sel == selector("usdt()") {
        vec![Token::Address(state.token)]
    } else if sel == selector("getAllMembers()") {
        vec![Token::Array(
            state.members.iter().map(|a| Token::Address(*a)).collect(),
        )]
    } else if sel == selector("members(address)") {
        let account = address_arg(args)?;
        let record = state.records.get(&account);
        let r = record.cloned().unwrap_or_default();
        vec![
            Token::String(r.name),
            Token::Uint(r.deposit),
            Token::Uint(r.active_loan),
            Token::Uint(r.remaining_loan),
            Token::Bool(record.is_some()),
        ]
    } else {
        return Err("unknown fund view".into());
    };
    Ok(encode(&out))
}

fn revert(reason: &str) -> ClientError {
    let payload = encode_call("Error(string)", &[Token::String(reason.to_string())]);
    RpcErrorObject {
        code: 3,
        message: format!("execution reverted: {reason}"),
        data: Some(json!(hexser::encode_bytes(&payload))),
    }
    .into_client_error()
}

fn invalid(msg: &str) -> ClientError {
    RpcErrorObject {
        code: -32602,
        message: msg.to_string(),
        data: None,
    }
    .into_client_error()
}

fn parse_call(params: &Value) -> Result<(Address, Address, Vec<u8>), ClientError> {
    let call = &params[0];
    let to = call["to"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("missing to"))?;
    let from = call["from"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Address::ZERO);
    let data = call["data"]
        .as_str()
        .and_then(|s| hexser::decode_bytes(s).ok())
        .unwrap_or_default();
    Ok((from, to, data))
}

// ---------------------------------------------------------------------------
// FakeChain
// ---------------------------------------------------------------------------

/// In-memory chain implementing [`Transport`].
pub struct FakeChain {
    state: Mutex<ChainState>,
    calls: Mutex<Vec<String>>,
}

impl FakeChain {
    /// A chain at block 100 where Alice is the connected account, Owner
    /// owns the fund, and nobody is a member yet.
    pub fn new() -> Arc<Self> {
        let state = ChainState {
            chain_id: CHAIN_ID,
            block: 100,
            accounts: vec![addr(ALICE)],
            fund: addr(FUND),
            token: addr(TOKEN),
            owner: addr(OWNER),
            decimals: 6,
            symbol: "USDT".into(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            members: Vec::new(),
            records: HashMap::new(),
            loan_factor: 2,
            force_revert: None,
            decimals_broken: false,
            reads_fail_after_send: false,
            reads_failing: false,
            receipts: HashMap::new(),
            logs: Vec::new(),
            tx_count: 0,
        };
        Arc::new(Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock()
    }

    /// Registers `account` with an existing deposit that is already held
    /// by the fund.
    pub fn seed_member(&self, account: &str, name: &str, deposit: U256) {
        let mut s = self.state.lock();
        let account = addr(account);
        s.members.push(account);
        s.records.insert(
            account,
            Record {
                name: name.into(),
                deposit,
                ..Record::default()
            },
        );
        let fund = s.fund;
        let held = s.balance(fund);
        s.balances.insert(fund, held + deposit);
    }

    pub fn mint(&self, account: &str, amount: U256) {
        let mut s = self.state.lock();
        let account = addr(account);
        let have = s.balance(account);
        s.balances.insert(account, have + amount);
    }

    pub fn set_allowance(&self, owner: &str, amount: U256) {
        let mut s = self.state.lock();
        let fund = s.fund;
        s.allowances.insert((addr(owner), fund), amount);
    }

    pub fn balance(&self, account: &str) -> U256 {
        self.state.lock().balance(addr(account))
    }

    pub fn record(&self, account: &str) -> Option<Record> {
        self.state.lock().records.get(&addr(account)).cloned()
    }

    /// Method names of every request, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| *m == method).count()
    }

    /// Mines `n` empty blocks.
    pub fn advance(&self, n: u64) {
        self.state.lock().block += n;
    }

    fn send(&self, params: &Value) -> Result<Value, ClientError> {
        let (from, to, data) = parse_call(params)?;
        let mut s = self.state.lock();

        s.tx_count += 1;
        s.block += 1;
        let block = s.block;
        let hash = keccak256(&s.tx_count.to_be_bytes());
        let hash_hex = hexser::encode_bytes(&hash);

        // Reverts are mined: state is untouched and the receipt reports it.
        let mut next = s.clone();
        let (status, emitted) = match execute(&mut next, from, to, &data) {
            Ok(emitted) => {
                *s = next;
                s.reads_failing = s.reads_fail_after_send;
                ("0x1", emitted)
            }
            Err(_) => ("0x0", Vec::new()),
        };

        let logs: Vec<Value> = emitted
            .into_iter()
            .enumerate()
            .map(|(i, (topics, data))| {
                json!({
                    "address": to.to_hex(),
                    "topics": topics.iter().map(|t| hexser::encode_bytes(t)).collect::<Vec<_>>(),
                    "data": hexser::encode_bytes(&data),
                    "blockNumber": format!("0x{block:x}"),
                    "transactionHash": hash_hex,
                    "logIndex": format!("0x{i:x}"),
                    "removed": false,
                })
            })
            .collect();
        s.logs.extend(logs.iter().cloned());

        s.receipts.insert(
            hash_hex.clone(),
            json!({
                "transactionHash": hash_hex,
                "blockNumber": format!("0x{block:x}"),
                "status": status,
                "gasUsed": "0xc350",
                "logs": logs,
            }),
        );
        Ok(json!(hash_hex))
    }

    fn get_logs(&self, params: &Value) -> Result<Value, ClientError> {
        let filter = &params[0];
        let quantity = |key: &str| {
            filter[key]
                .as_str()
                .and_then(|s| hexser::decode_quantity_u64(s).ok())
                .ok_or_else(|| invalid(key))
        };
        let from = quantity("fromBlock")?;
        let to = quantity("toBlock")?;
        let address = filter["address"].as_str().unwrap_or_default().to_lowercase();
        let wanted: Vec<Value> = filter["topics"].as_array().cloned().unwrap_or_default();

        let s = self.state.lock();
        let matches = s
            .logs
            .iter()
            .filter(|log| {
                let block = log["blockNumber"]
                    .as_str()
                    .and_then(|b| hexser::decode_quantity_u64(b).ok())
                    .unwrap_or_default();
                if block < from || block > to {
                    return false;
                }
                if log["address"].as_str().unwrap_or_default() != address {
                    return false;
                }
                wanted.iter().enumerate().all(|(i, slot)| match slot {
                    Value::Array(options) => options.contains(&log["topics"][i]),
                    _ => true,
                })
            })
            .cloned()
            .collect::<Vec<_>>();
        Ok(Value::Array(matches))
    }
}

#[async_trait]
impl Transport for FakeChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.calls.lock().push(method.to_string());

        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                let accounts = self.state.lock().accounts.clone();
                Ok(json!(accounts.iter().map(|a| a.to_hex()).collect::<Vec<_>>()))
            }
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.state.lock().chain_id))),
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", self.state.lock().block))),
            "eth_call" => {
                let (_, to, data) = parse_call(&params)?;
                let s = self.state.lock();
                if s.reads_failing {
                    return Err(RpcErrorObject {
                        code: -32000,
                        message: "header not found".into(),
                        data: None,
                    }
                    .into_client_error());
                }
                view(&s, to, &data)
                    .map(|out| json!(hexser::encode_bytes(&out)))
                    .map_err(|r| revert(&r))
            }
            "eth_estimateGas" => {
                let (from, to, data) = parse_call(&params)?;
                let mut scratch = self.state.lock().clone();
                execute(&mut scratch, from, to, &data)
                    .map(|_| json!("0xc350"))
                    .map_err(|r| revert(&r))
            }
            "eth_sendTransaction" => self.send(&params),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                Ok(self
                    .state
                    .lock()
                    .receipts
                    .get(hash)
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            "eth_getLogs" => self.get_logs(&params),
            other => Err(RpcErrorObject {
                code: -32601,
                message: format!("the method {other} does not exist/is not available"),
                data: None,
            }
            .into_client_error()),
        }
    }
}
