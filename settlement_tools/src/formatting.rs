use std::fmt::Write;

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use settlement_engine::{
    account_objects::Reconciliation,
    db_types::{LedgerEntry, MerchantAccount, MerchantDailyStats, PayoutRequest, Subscription},
    RefundOutcome,
    SettlementOutcome,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_table() -> Table {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table
}

pub fn format_merchant(merchant: &MerchantAccount) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Merchant #{}: {}", merchant.id, merchant.name)?;
    match merchant.plan_fee {
        Some(fee) => writeln!(f, "Plan fee:  {fee}")?,
        None => writeln!(f, "Plan fee:  platform default")?,
    }
    writeln!(f, "Available: {}", merchant.available_balance)?;
    writeln!(f, "Escrow:    {}", merchant.pending_escrow)?;
    Ok(f)
}

pub fn format_settlement(outcome: &SettlementOutcome) -> Result<String> {
    let mut f = String::new();
    let p = &outcome.payment;
    writeln!(f, "Payment #{} ({}) settled", p.id, p.gateway_ref)?;
    writeln!(f, "Gross:        {}", p.amount)?;
    writeln!(f, "Platform fee: {}", outcome.platform_fee)?;
    writeln!(f, "Net credited: {}", outcome.net_amount)?;
    if let Some(entry) = &outcome.ledger_entry {
        writeln!(f, "Balance now:  {}", entry.balance_after)?;
    }
    writeln!(
        f,
        "Subscription #{} {:?}, expires {}",
        outcome.subscription.id,
        outcome.subscription_outcome,
        expiry(&outcome.subscription)
    )?;
    Ok(f)
}

pub fn format_refund(outcome: &RefundOutcome) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Payment #{} refunded. Refund #{}", outcome.payment.id, outcome.refund.id)?;
    writeln!(f, "Debited:     {}", outcome.refund.amount)?;
    writeln!(f, "Balance now: {}", outcome.ledger_entry.balance_after)?;
    if let Some(sub) = &outcome.cancelled_subscription {
        writeln!(f, "Subscription #{} cancelled", sub.id)?;
    }
    Ok(f)
}

pub fn format_reconciliation(rec: &Reconciliation) -> String {
    if rec.is_balanced() {
        format!("Merchant #{} is balanced at {}", rec.merchant_id, rec.available_balance)
    } else {
        format!(
            "Merchant #{} does NOT reconcile. Balance: {}, ledger total: {}, discrepancy: {}",
            rec.merchant_id,
            rec.available_balance,
            rec.ledger_total,
            rec.discrepancy()
        )
    }
}

pub fn format_ledger(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return "No ledger entries".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["ID", "Type", "Amount", "Balance after", "Payment", "Description", "Created At"]);
    entries.iter().for_each(|e| {
        table.add_row(row![
            e.id,
            e.entry_type.to_string(),
            r->e.amount.to_string(),
            r->e.balance_after.to_string(),
            e.payment_id.map(|id| id.to_string()).unwrap_or_default(),
            e.description,
            e.created_at.to_rfc3339()
        ]);
    });
    table.to_string()
}

pub fn format_payouts(payouts: &[PayoutRequest]) -> String {
    if payouts.is_empty() {
        return "No payout requests".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["ID", "Amount", "Status", "Method", "Destination", "Reviewed by", "Note", "Updated At"]);
    payouts.iter().for_each(|p| {
        table.add_row(row![
            p.id,
            r->p.amount.to_string(),
            p.status.to_string(),
            p.method,
            p.destination,
            p.reviewed_by.as_deref().unwrap_or_default(),
            p.note.as_deref().unwrap_or_default(),
            p.updated_at.to_rfc3339()
        ]);
    });
    table.to_string()
}

pub fn format_subscriptions(subs: &[Subscription]) -> String {
    if subs.is_empty() {
        return "No subscriptions".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["ID", "Service", "Tier", "Status", "Starts", "Expires"]);
    subs.iter().for_each(|s| {
        table.add_row(row![s.id, s.service_id, s.tier_id, s.status.to_string(), s.starts_at.to_rfc3339(), expiry(s)]);
    });
    table.to_string()
}

pub fn format_stats(stats: &[MerchantDailyStats]) -> String {
    if stats.is_empty() {
        return "No settlements in this period".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["Day", "Payments", "Gross", "Revenue", "New subs", "Renewals"]);
    stats.iter().for_each(|s| {
        table.add_row(row![
            s.day,
            r->s.settled_payments,
            r->s.gross.to_string(),
            r->s.revenue.to_string(),
            r->s.new_subscriptions,
            r->s.renewals
        ]);
    });
    table.to_string()
}

fn expiry(sub: &Subscription) -> String {
    sub.expires_at.map(|e| e.to_rfc3339()).unwrap_or_else(|| "never".to_string())
}
