//! Line codec for the event log.
//!
//! One event per line, LF terminated: `seq,ts_ns,topic,payload`. The
//! payload is the remainder after the third comma and may itself contain
//! commas. Payload forms:
//!
//! - `-` for an empty payload
//! - `TICK|<symbol>|<pq>|<qty>`
//! - `LOG|<text>` (no LF, no `|` in the baseline)
//! - `BAR|<symbol>|<o>|<h>|<l>|<c>|<v>|<start_ts_ns>|<end_ts_ns>`

use std::str::FromStr;

use crate::error::CodecError;
use crate::market_data::base_data::{Bar, Event, Header, Payload, Tick, Topic};

pub fn serialize_payload(p: &Payload) -> String {
    match p {
        Payload::Empty => "-".to_string(),
        Payload::Tick(t) => format!("TICK|{}|{}|{}", t.symbol, t.pq, t.qty),
        Payload::LogText(text) => format!("LOG|{text}"),
        Payload::Bar(b) => format!(
            "BAR|{}|{}|{}|{}|{}|{}|{}|{}",
            b.symbol, b.open, b.high, b.low, b.close, b.volume, b.start_ts_ns, b.end_ts_ns
        ),
    }
}

pub fn serialize_event(e: &Event) -> String {
    format!(
        "{},{},{},{}",
        e.header.seq,
        e.header.ts_ns,
        e.header.topic,
        serialize_payload(&e.payload)
    )
}

/// Payload parsing is forgiving: a numeric failure inside a recognized
/// payload degrades to `Empty` (the header still applies), and an
/// unrecognized token is kept as log text.
pub fn parse_payload(s: &str) -> Payload {
    if s.is_empty() || s == "-" {
        return Payload::Empty;
    }
    if let Some(rest) = s.strip_prefix("TICK|") {
        let parts: Vec<&str> = rest.split('|').collect();
        if parts.len() < 3 {
            return Payload::Empty;
        }
        let (Ok(pq), Ok(qty)) = (parts[1].parse::<f64>(), parts[2].parse::<u32>()) else {
            return Payload::Empty;
        };
        return Payload::Tick(Tick { symbol: parts[0].to_string(), pq, qty });
    }
    if let Some(text) = s.strip_prefix("LOG|") {
        return Payload::LogText(text.to_string());
    }
    if let Some(rest) = s.strip_prefix("BAR|") {
        let parts: Vec<&str> = rest.split('|').collect();
        if parts.len() < 8 {
            return Payload::Empty;
        }
        let fields = (
            parts[1].parse::<f64>(),
            parts[2].parse::<f64>(),
            parts[3].parse::<f64>(),
            parts[4].parse::<f64>(),
            parts[5].parse::<u64>(),
            parts[6].parse::<u64>(),
            parts[7].parse::<u64>(),
        );
        let (Ok(open), Ok(high), Ok(low), Ok(close), Ok(volume), Ok(start), Ok(end)) = fields
        else {
            return Payload::Empty;
        };
        return Payload::Bar(Bar {
            symbol: parts[0].to_string(),
            open,
            high,
            low,
            close,
            volume,
            start_ts_ns: start,
            end_ts_ns: end,
        });
    }
    Payload::LogText(s.to_string())
}

pub fn parse_event(line: &str) -> Result<Event, CodecError> {
    let mut parts = line.splitn(4, ',');
    let seq_field = parts.next().ok_or(CodecError::Malformed)?;
    let ts_field = parts.next().ok_or(CodecError::Malformed)?;
    let topic_field = parts.next().ok_or(CodecError::Malformed)?;
    let payload_field = parts.next().ok_or(CodecError::Malformed)?;

    let seq = seq_field
        .parse::<u64>()
        .map_err(|_| CodecError::BadHeader(seq_field.to_string()))?;
    let ts_ns = ts_field
        .parse::<u64>()
        .map_err(|_| CodecError::BadHeader(ts_field.to_string()))?;
    let topic = Topic::from_str(topic_field)
        .map_err(|_| CodecError::UnknownTopic(topic_field.to_string()))?;

    Ok(Event { header: Header { seq, topic, ts_ns }, payload: parse_payload(payload_field) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_round_trip() {
        let mut e = Event::tick("NIFTY", 22500.5, 123);
        e.header.seq = 42;
        e.header.ts_ns = 1_234_567_890;
        let line = serialize_event(&e);
        assert_eq!(line, "42,1234567890,MD_TICK,TICK|NIFTY|22500.5|123");
        assert_eq!(parse_event(&line).unwrap(), e);
    }

    #[test]
    fn log_round_trip_keeps_commas() {
        let mut e = Event::log_text("hello, world, again");
        e.header.seq = 7;
        e.header.ts_ns = 999;
        let parsed = parse_event(&serialize_event(&e)).unwrap();
        assert_eq!(parsed, e);
    }

    #[test]
    fn bar_round_trip() {
        let bar = Bar {
            symbol: "BANKNIFTY".into(),
            open: 10.0,
            high: 12.5,
            low: 9.75,
            close: 11.0,
            volume: 42,
            start_ts_ns: 1_000_000_000,
            end_ts_ns: 1_999_999_999,
        };
        let mut e = Event::bar(bar, Topic::Bar1s);
        e.header.seq = 3;
        e.header.ts_ns = 2_000_000_000;
        assert_eq!(parse_event(&serialize_event(&e)).unwrap(), e);
    }

    #[test]
    fn empty_payload() {
        let mut e = Event::heartbeat();
        e.header.seq = 1;
        e.header.ts_ns = 5;
        let line = serialize_event(&e);
        assert_eq!(line, "1,5,HEARTBEAT,-");
        assert_eq!(parse_event(&line).unwrap().payload, Payload::Empty);
    }

    #[test]
    fn header_failures_reject_the_line() {
        assert_eq!(parse_event("not-a-line"), Err(CodecError::Malformed));
        assert_eq!(parse_event("1,2,MD_TICK"), Err(CodecError::Malformed));
        assert!(matches!(parse_event("x,2,MD_TICK,-"), Err(CodecError::BadHeader(_))));
        assert!(matches!(parse_event("1,y,MD_TICK,-"), Err(CodecError::BadHeader(_))));
        assert!(matches!(parse_event("1,2,MD_TRADE,-"), Err(CodecError::UnknownTopic(_))));
    }

    #[test]
    fn tick_numeric_failure_degrades_to_empty() {
        let e = parse_event("5,6,MD_TICK,TICK|NIFTY|oops|100").unwrap();
        assert_eq!(e.header.seq, 5);
        assert_eq!(e.header.ts_ns, 6);
        assert_eq!(e.payload, Payload::Empty);
    }

    #[test]
    fn unknown_payload_token_becomes_log_text() {
        let e = parse_event("1,2,LOG,whatever text").unwrap();
        assert_eq!(e.payload, Payload::LogText("whatever text".into()));
    }
}
