//! Command Router
//!
//! Pure classification of an inbound message into one routing decision.
//! Rules are evaluated in fixed priority order, first match wins; no state
//! survives between invocations (the bot has no multi-turn memory — any
//! message matching the report rule is accepted as a report regardless of
//! prior menu choices).

use once_cell::sync::Lazy;
use regex::Regex;

static CEK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^cek #(\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    FallenTree,
    CityPark,
}

/// Routing decision for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowMainMenu,
    ShowSubmenu(ReportKind),
    ShowInfo,
    RecordReport,
    QueryStatus(u64),
    Unrecognized,
}

/// Classify the trimmed message text plus attachment presence.
pub fn classify(text: &str, has_attachment: bool) -> Command {
    let text = text.trim();

    if text.eq_ignore_ascii_case("halo") || text.eq_ignore_ascii_case("menu") {
        return Command::ShowMainMenu;
    }
    match text {
        "1" => return Command::ShowSubmenu(ReportKind::FallenTree),
        "2" => return Command::ShowSubmenu(ReportKind::CityPark),
        "3" => return Command::ShowInfo,
        _ => {}
    }

    let lower = text.to_lowercase();
    if lower.starts_with("lokasi:") || lower.starts_with("taman:") || has_attachment {
        return Command::RecordReport;
    }

    if let Some(caps) = CEK_RE.captures(text) {
        // Digit runs longer than u64 fall through to the fallback reply.
        return match caps[1].parse::<u64>() {
            Ok(id) => Command::QueryStatus(id),
            Err(_) => Command::Unrecognized,
        };
    }

    Command::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("halo", Command::ShowMainMenu)]
    #[case("HALO", Command::ShowMainMenu)]
    #[case("menu", Command::ShowMainMenu)]
    #[case("Menu", Command::ShowMainMenu)]
    #[case("  menu  ", Command::ShowMainMenu)]
    #[case("1", Command::ShowSubmenu(ReportKind::FallenTree))]
    #[case("2", Command::ShowSubmenu(ReportKind::CityPark))]
    #[case("3", Command::ShowInfo)]
    #[case("LOKASI: Jl. A", Command::RecordReport)]
    #[case("lokasi: depan pasar", Command::RecordReport)]
    #[case("TAMAN: Tirto Agung", Command::RecordReport)]
    #[case("cek #12", Command::QueryStatus(12))]
    #[case("CEK #1", Command::QueryStatus(1))]
    #[case("asdf", Command::Unrecognized)]
    #[case("cek #", Command::Unrecognized)]
    #[case("cek #12 extra", Command::Unrecognized)]
    #[case("halo semua", Command::Unrecognized)]
    #[case("", Command::Unrecognized)]
    fn test_text_rules(#[case] text: &str, #[case] expected: Command) {
        assert_eq!(classify(text, false), expected);
    }

    #[test]
    fn test_attachment_records_report() {
        assert_eq!(classify("", true), Command::RecordReport);
        assert_eq!(classify("foto pohon", true), Command::RecordReport);
    }

    #[test]
    fn test_attachment_outranks_cek() {
        // A captioned photo is a report even when the caption looks like a
        // status query.
        assert_eq!(classify("cek #1", true), Command::RecordReport);
    }

    #[test]
    fn test_menu_outranks_attachment() {
        assert_eq!(classify("menu", true), Command::ShowMainMenu);
    }

    #[test]
    fn test_cek_overflow_digits() {
        assert_eq!(
            classify("cek #99999999999999999999999999", false),
            Command::Unrecognized
        );
    }
}
