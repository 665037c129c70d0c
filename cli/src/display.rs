//! # Output Rendering
//!
//! Human-readable text or `--json` for snapshots, action reports and
//! events. Everything goes to stdout; logs stay on stderr.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use cfund_contracts::{ActionReport, FundEvent, FundLog, FundSnapshot, Member};
use cfund_protocol::config::network_name;
use cfund_protocol::units::TokenAmount;
use cfund_protocol::{Address, TxHash};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub address: Address,
    pub name: String,
    pub deposit: TokenAmount,
    pub active_loan: TokenAmount,
    pub remaining_loan: TokenAmount,
    pub is_you: bool,
}

impl MemberView {
    fn new(m: &Member, snap: &FundSnapshot) -> Self {
        Self {
            address: m.address,
            name: m.name.clone(),
            deposit: snap.amount(m.deposit),
            active_loan: snap.amount(m.active_loan),
            remaining_loan: snap.amount(m.remaining_loan),
            is_you: m.address == snap.account,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub account: Address,
    pub network: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub fund: Address,
    pub token: Address,
    pub symbol: String,
    pub wallet_balance: TokenAmount,
    pub allowance: TokenAmount,
    pub total_fund: TokenAmount,
    pub owner: Address,
    pub is_owner: bool,
    pub member: Option<MemberView>,
    pub max_loan: Option<TokenAmount>,
    pub members: Vec<MemberView>,
}

impl From<&FundSnapshot> for SnapshotView {
    fn from(snap: &FundSnapshot) -> Self {
        Self {
            account: snap.account,
            network: network_name(snap.chain_id),
            chain_id: snap.chain_id,
            block_number: snap.block_number,
            fund: snap.fund,
            token: snap.token,
            symbol: snap.symbol.clone(),
            wallet_balance: snap.wallet_balance,
            allowance: snap.allowance,
            total_fund: snap.total_fund,
            owner: snap.owner,
            is_owner: snap.is_owner,
            member: snap.me.as_ref().map(|m| MemberView::new(m, snap)),
            max_loan: snap.max_loan,
            members: snap.members.iter().map(|m| MemberView::new(m, snap)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    pub action: String,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: String,
    pub approval: Option<TxHash>,
    pub confirmed_at: DateTime<Utc>,
    pub snapshot: SnapshotView,
}

impl From<&ActionReport> for ReportView {
    fn from(r: &ActionReport) -> Self {
        Self {
            action: r.action.to_string(),
            tx_hash: r.tx_hash,
            block_number: r.block_number,
            gas_used: r.gas_used.to_string(),
            approval: r.approval,
            confirmed_at: r.confirmed_at,
            snapshot: SnapshotView::from(&r.snapshot),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub event: String,
    pub account: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<TokenAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

impl EventView {
    pub fn new(log: &FundLog, decimals: u8) -> Self {
        let amt = |raw| Some(TokenAmount::new(raw, decimals));
        let (amount, fee, name) = match &log.event {
            FundEvent::Deposit { amount, fee, .. }
            | FundEvent::Loan { amount, fee, .. }
            | FundEvent::Installment { amount, fee, .. } => (amt(*amount), amt(*fee), None),
            FundEvent::MemberAdded { name, .. } => (None, None, Some(name.clone())),
            FundEvent::EmergencyWithdraw { amount, .. } => (amt(*amount), None, None),
        };
        Self {
            event: log.event.kind().to_string(),
            account: log.event.account(),
            amount,
            fee,
            name,
            block_number: log.block_number,
            tx_hash: log.tx_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

pub fn render_snapshot(snap: &FundSnapshot) -> String {
    let sym = &snap.symbol;
    let mut out = String::new();

    let role = if snap.is_owner { " (owner)" } else { "" };
    let _ = writeln!(out, "Account      {}{}", snap.account, role);
    let _ = writeln!(
        out,
        "Network      {} (chain {})",
        network_name(snap.chain_id),
        snap.chain_id
    );
    let _ = writeln!(out, "Block        {}", snap.block_number);
    let _ = writeln!(out, "Balance      {} {}", snap.wallet_balance, sym);
    let _ = writeln!(out, "Allowance    {} {}", snap.allowance, sym);
    let _ = writeln!(out, "Total fund   {} {}", snap.total_fund, sym);
    out.push('\n');

    match &snap.me {
        Some(me) => {
            let _ = writeln!(out, "Member       {}", me.name);
            let _ = writeln!(out, "  Deposit      {} {}", snap.amount(me.deposit), sym);
            let _ = writeln!(out, "  Active loan  {} {}", snap.amount(me.active_loan), sym);
            let _ = writeln!(out, "  Remaining    {} {}", snap.amount(me.remaining_loan), sym);
            if let Some(max) = snap.max_loan {
                let _ = writeln!(out, "  Max loan     {} {}", max, sym);
            }
        }
        None => {
            let _ = writeln!(out, "Not a member of this fund.");
        }
    }
    out.push('\n');

    out.push_str(&render_members(snap));
    out
}

pub fn render_members(snap: &FundSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Members ({})", snap.members.len());
    if snap.members.is_empty() {
        return out;
    }

    let rows: Vec<MemberView> = snap
        .members
        .iter()
        .map(|m| MemberView::new(m, snap))
        .collect();
    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let _ = writeln!(
        out,
        "  {:<13}  {:<name_width$}  {:>14}  {:>14}  {:>14}",
        "ADDRESS", "NAME", "DEPOSIT", "ACTIVE LOAN", "REMAINING"
    );
    for r in &rows {
        let marker = if r.is_you { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {:<13}  {:<name_width$}  {:>14}  {:>14}  {:>14}",
            marker,
            r.address.short(),
            r.name,
            r.deposit.to_string(),
            r.active_loan.to_string(),
            r.remaining_loan.to_string(),
        );
    }
    out
}

pub fn render_report(report: &ActionReport) -> String {
    let mut out = String::new();
    if let Some(approval) = report.approval {
        let _ = writeln!(out, "Approval     {}", approval);
    }
    let _ = writeln!(
        out,
        "{} confirmed in block {} (gas used {})",
        report.action, report.block_number, report.gas_used
    );
    let _ = writeln!(out, "Transaction  {}", report.tx_hash);
    out.push('\n');
    out.push_str(&render_snapshot(&report.snapshot));
    out
}

pub fn render_event(view: &EventView, symbol: &str) -> String {
    let block = view
        .block_number
        .map(|b| format!("#{b}"))
        .unwrap_or_else(|| "pending".to_string());
    let detail = match (&view.amount, &view.fee, &view.name) {
        (Some(amount), Some(fee), _) => format!("{amount} {symbol} (fee {fee})"),
        (Some(amount), None, _) => format!("{amount} {symbol}"),
        (None, _, Some(name)) => format!("\"{name}\""),
        _ => String::new(),
    };
    format!("[{block}] {} {} {}", view.event, view.account.short(), detail)
        .trim_end()
        .to_string()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Chooses between text and JSON on stdout.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit<V: Serialize>(&self, view: &V, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(view)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }

    pub fn snapshot(&self, snap: &FundSnapshot) -> Result<()> {
        self.emit(&SnapshotView::from(snap), || render_snapshot(snap))
    }

    pub fn members(&self, snap: &FundSnapshot) -> Result<()> {
        let rows: Vec<MemberView> = snap
            .members
            .iter()
            .map(|m| MemberView::new(m, snap))
            .collect();
        self.emit(&rows, || render_members(snap))
    }

    pub fn report(&self, report: &ActionReport) -> Result<()> {
        self.emit(&ReportView::from(report), || render_report(report))
    }

    /// Events are printed one per line; JSON mode emits one compact object
    /// per line so the stream can be consumed incrementally.
    pub fn events(&self, batch: &[FundLog], decimals: u8, symbol: &str) -> Result<()> {
        for log in batch {
            let view = EventView::new(log, decimals);
            if self.json {
                println!("{}", serde_json::to_string(&view)?);
            } else {
                println!("{}", render_event(&view, symbol));
            }
        }
        Ok(())
    }
}
