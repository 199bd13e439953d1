use chrono::DateTime;
use privdock_core::{LedgerEntry, RevealState, StoredFile};

const PREVIEW_LEN: usize = 24;

pub fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("@{}", timestamp))
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn state_label(state: &RevealState) -> String {
    match state {
        RevealState::Hidden => "hidden".into(),
        RevealState::Revealing => "revealing".into(),
        RevealState::Revealed { locator, .. } => format!("revealed: {}", locator),
        RevealState::Failed { reason, .. } => format!("failed: {}", reason),
    }
}

/// Lines describing a fresh store. The one-time address opens the
/// envelope, so it is only included on request.
pub fn stored_summary(stored: &StoredFile, show_secret: bool) -> Vec<String> {
    let mut lines = vec![
        format!("   Tx:            {}", stored.receipt.hash_hex()),
        format!("   Block:         {}", stored.receipt.block_number),
    ];
    if show_secret {
        lines.push(format!("   One-time addr: {}", stored.ephemeral));
    }
    lines.push(format!("   Envelope:      {}", stored.envelope));
    lines.push(format!("   Handle:        {}", stored.identity_handle));
    lines
}

pub fn print_entries(entries: &[LedgerEntry]) {
    for entry in entries {
        let record = &entry.record;
        println!("[{}] {}", entry.index, record.name);
        println!("     Stored:   {}", format_timestamp(record.timestamp));
        println!("     Envelope: {}", preview(&record.envelope));
        println!("     Handle:   {}", record.identity_handle.short());
        println!("     State:    {}", state_label(&entry.state));
    }
}
