//! Syslog listener
//!
//! Parses RFC 3164 (BSD) and RFC 5424 messages into structured records,
//! classifies them against known network-event patterns, and maintains
//! severity/category distributions. Priority decomposes as
//! `facility = priority >> 3`, `severity = priority & 7`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use regex::{Regex, RegexBuilder};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use netpulse_model::SyslogMessage;

use crate::CollectError;

/// Ordered classifier patterns; first match wins.
const CLASSIFIER_PATTERNS: &[(&str, &str)] = &[
    (r"BGP-5-ADJCHANGE.*neighbor\s+(\S+).*(\w+)$", "bgp_state_change"),
    (r"OSPF-5-ADJCHG.*(\S+).*from\s+(\w+)\s+to\s+(\w+)", "ospf_state_change"),
    (r"LINK-3-UPDOWN.*Interface\s+(\S+).*changed.*to\s+(\w+)", "interface_state"),
    (r"SYS-5-RESTART", "device_restart"),
    (r"SEC-6-IPACCESSLOG", "acl_hit"),
    (r"HSRP-5-STATECHANGE", "hsrp_state"),
    (r"EIGRP-5-NBRCHANGE", "eigrp_neighbor"),
    (r"STP-.*TOPOLOGY_CHANGE", "stp_change"),
    (r"CONFIG-.*CONFIG_I", "config_change"),
    (r"PLATFORM-.*FAN|TEMP|POWER", "environmental"),
];

/// Syslog severity display name (0-7, with a fallback for out-of-range).
pub fn severity_name(severity: u8) -> String {
    match severity {
        0 => "emergency".to_string(),
        1 => "alert".to_string(),
        2 => "critical".to_string(),
        3 => "error".to_string(),
        4 => "warning".to_string(),
        5 => "notice".to_string(),
        6 => "informational".to_string(),
        7 => "debug".to_string(),
        other => format!("severity-{other}"),
    }
}

/// Syslog facility display name.
pub fn facility_name(facility: u8) -> String {
    match facility {
        0 => "kern".to_string(),
        1 => "user".to_string(),
        2 => "mail".to_string(),
        3 => "daemon".to_string(),
        4 => "auth".to_string(),
        5 => "syslog".to_string(),
        6 => "lpr".to_string(),
        7 => "news".to_string(),
        8 => "uucp".to_string(),
        9 => "cron".to_string(),
        10 => "authpriv".to_string(),
        11 => "ftp".to_string(),
        16..=23 => format!("local{}", facility - 16),
        other => format!("facility-{other}"),
    }
}

/// Render a message in RFC 5424 framing.
///
/// The parser recovers facility, severity, hostname, program, pid, and the
/// free-text message from this form.
pub fn render_rfc5424(msg: &SyslogMessage) -> String {
    let priority = (u16::from(msg.facility) << 3) | u16::from(msg.severity);
    let hostname = if msg.device_hostname.is_empty() {
        "-"
    } else {
        msg.device_hostname.as_str()
    };
    let program = if msg.program.is_empty() {
        "-"
    } else {
        msg.program.as_str()
    };
    let pid = msg.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
    format!(
        "<{priority}>1 {} {hostname} {program} {pid} - {}",
        msg.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        msg.message
    )
}

/// Classification outcome for one message.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: String,
    pub matched: bool,
}

/// Compiled parsers shared between the listener and its ingest task.
struct SyslogParser {
    rfc5424: Regex,
    rfc3164: Regex,
    classifiers: Vec<(Regex, &'static str)>,
}

impl SyslogParser {
    fn new() -> Self {
        // Patterns are fixed strings; compilation cannot fail.
        let classifiers = CLASSIFIER_PATTERNS
            .iter()
            .filter_map(|(pattern, category)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, *category))
            })
            .collect();
        Self {
            rfc5424: Regex::new(r"^<(\d+)>1\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(.*)$")
                .unwrap(),
            rfc3164: Regex::new(r"^<(\d+)>(\w{3}\s+\d+\s+\d+:\d+:\d+)\s+(\S+)\s+(.*)$").unwrap(),
            classifiers,
        }
    }

    fn parse_rfc5424(&self, raw: &str, source_ip: &str) -> Option<SyslogMessage> {
        let caps = self.rfc5424.captures(raw)?;
        let priority: u16 = caps.get(1)?.as_str().parse().ok()?;

        let mut msg = SyslogMessage::new(source_ip, caps.get(7)?.as_str());
        msg.facility = (priority >> 3) as u8;
        msg.severity = (priority & 7) as u8;
        let hostname = caps.get(3)?.as_str();
        if hostname != "-" {
            msg.device_hostname = hostname.to_string();
        }
        let program = caps.get(4)?.as_str();
        if program != "-" {
            msg.program = program.to_string();
        }
        msg.pid = caps.get(5)?.as_str().parse().ok();
        Some(msg)
    }

    fn parse_rfc3164(&self, raw: &str, source_ip: &str) -> Option<SyslogMessage> {
        let caps = self.rfc3164.captures(raw)?;
        let priority: u16 = caps.get(1)?.as_str().parse().ok()?;

        let mut msg = SyslogMessage::new(source_ip, caps.get(4)?.as_str());
        msg.facility = (priority >> 3) as u8;
        msg.severity = (priority & 7) as u8;
        msg.device_hostname = caps.get(3)?.as_str().to_string();
        Some(msg)
    }

    fn classify(&self, message: &str) -> Classification {
        for (re, category) in &self.classifiers {
            if re.is_match(message) {
                return Classification {
                    category: (*category).to_string(),
                    matched: true,
                };
            }
        }
        Classification {
            category: "unclassified".to_string(),
            matched: false,
        }
    }
}

#[derive(Default)]
struct EventBuffer {
    messages: Mutex<Vec<SyslogMessage>>,
    severity_counts: Mutex<HashMap<u8, u64>>,
    category_counts: Mutex<HashMap<String, u64>>,
    parse_errors: AtomicU64,
}

impl EventBuffer {
    fn record(&self, msg: SyslogMessage, category: &str) {
        {
            let mut counts = match self.severity_counts.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *counts.entry(msg.severity).or_default() += 1;
        }
        {
            let mut counts = match self.category_counts.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *counts.entry(category.to_string()).or_default() += 1;
        }
        let mut messages = match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(msg);
    }
}

/// Syslog message receiver and parser.
pub struct SyslogListener {
    pub listen_port: u16,
    simulated: bool,
    running: bool,
    parser: Arc<SyslogParser>,
    buffer: Arc<EventBuffer>,
    ingest_task: Option<JoinHandle<()>>,
}

impl SyslogListener {
    pub fn new(listen_port: u16, simulated: bool) -> Self {
        Self {
            listen_port,
            simulated,
            running: false,
            parser: Arc::new(SyslogParser::new()),
            buffer: Arc::new(EventBuffer::default()),
            ingest_task: None,
        }
    }

    /// Start the listener. Live mode binds the UDP ingest socket; simulated
    /// mode seeds a day's worth of plausible device logs.
    pub async fn start(&mut self) -> Result<(), CollectError> {
        self.running = true;
        info!(port = self.listen_port, "syslog listener started");

        if self.simulated {
            self.seed_demo_messages(200);
            return Ok(());
        }

        let socket = UdpSocket::bind(("0.0.0.0", self.listen_port)).await?;
        let parser = Arc::clone(&self.parser);
        let buffer = Arc::clone(&self.buffer);
        self.ingest_task = Some(tokio::spawn(async move {
            let mut datagram = [0u8; 8192];
            loop {
                match socket.recv_from(&mut datagram).await {
                    Ok((len, peer)) => {
                        let raw = String::from_utf8_lossy(&datagram[..len]);
                        let source_ip = peer.ip().to_string();
                        let parsed = parser
                            .parse_rfc5424(raw.trim(), &source_ip)
                            .or_else(|| parser.parse_rfc3164(raw.trim(), &source_ip));
                        match parsed {
                            Some(mut msg) => {
                                let class = parser.classify(&msg.message);
                                msg.structured_data
                                    .insert("category".to_string(), class.category.clone());
                                buffer.record(msg, &class.category);
                            }
                            None => {
                                buffer.parse_errors.fetch_add(1, Ordering::Relaxed);
                                debug!(%peer, "dropped unparseable syslog message");
                            }
                        }
                    }
                    Err(e) => {
                        warn!("syslog socket error: {e}");
                        break;
                    }
                }
            }
        }));
        Ok(())
    }

    /// Stop the listener and its ingest loop.
    pub async fn stop(&mut self) {
        self.running = false;
        if let Some(task) = self.ingest_task.take() {
            task.abort();
        }
        info!("syslog listener stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Parse an RFC 5424 message.
    pub fn parse_rfc5424(&self, raw: &str) -> Option<SyslogMessage> {
        self.parser.parse_rfc5424(raw, "0.0.0.0")
    }

    /// Parse an RFC 3164 (BSD) message.
    pub fn parse_rfc3164(&self, raw: &str) -> Option<SyslogMessage> {
        self.parser.parse_rfc3164(raw, "0.0.0.0")
    }

    /// Classify a message against the known network patterns.
    pub fn classify(&self, message: &str) -> Classification {
        self.parser.classify(message)
    }

    /// Record a message, attaching its classifier category.
    pub fn record(&self, mut msg: SyslogMessage) {
        let class = self.parser.classify(&msg.message);
        msg.structured_data
            .insert("category".to_string(), class.category.clone());
        self.buffer.record(msg, &class.category);
    }

    /// Query collected messages with filters. `max_severity` keeps messages
    /// at or below the given numeric severity (lower is more severe).
    pub fn messages(
        &self,
        since: Option<DateTime<Utc>>,
        max_severity: Option<u8>,
        hostname: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> Vec<SyslogMessage> {
        let messages = match self.buffer.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages
            .iter()
            .filter(|m| since.map_or(true, |s| m.timestamp >= s))
            .filter(|m| max_severity.map_or(true, |s| m.severity <= s))
            .filter(|m| hostname.map_or(true, |h| m.device_hostname == h))
            .filter(|m| {
                category.map_or(true, |c| {
                    m.structured_data.get("category").map(String::as_str) == Some(c)
                })
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Message counts keyed by severity name.
    pub fn severity_distribution(&self) -> HashMap<String, u64> {
        let counts = match self.buffer.severity_counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counts
            .iter()
            .map(|(sev, count)| (severity_name(*sev), *count))
            .collect()
    }

    /// Message counts keyed by classifier category.
    pub fn category_distribution(&self) -> HashMap<String, u64> {
        let counts = match self.buffer.category_counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counts.clone()
    }

    pub fn message_count(&self) -> usize {
        match self.buffer.messages.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn parse_errors(&self) -> u64 {
        self.buffer.parse_errors.load(Ordering::Relaxed)
    }

    fn seed_demo_messages(&self, count: usize) {
        let devices = [
            ("router-core-1", "10.0.0.1"),
            ("router-core-2", "10.0.0.2"),
            ("switch-dist-1", "10.0.1.1"),
            ("switch-dist-2", "10.0.1.2"),
            ("switch-access-1", "10.0.2.1"),
            ("firewall-edge-1", "10.0.0.254"),
        ];
        let mut rng = rand::thread_rng();
        let now = Utc::now();

        for _ in 0..count {
            let (hostname, source_ip) = devices[rng.gen_range(0..devices.len())];
            let n = rng.gen_range(1..11);
            let n2 = rng.gen_range(1..255);
            let intf = rng.gen_range(0..8);
            let state = if rng.gen_bool(0.5) { "Up" } else { "Down" };

            let (severity, text): (u8, String) = match rng.gen_range(0..15) {
                0 => (6, "%SYS-6-LOGGINGHOST_STARTSTOP: Logging to host 10.0.0.100 port 514 started".to_string()),
                1 => (5, format!("%BGP-5-ADJCHANGE: neighbor 10.0.0.{n} {state}")),
                2 => (5, format!("%OSPF-5-ADJCHG: Process 1, Nbr 10.0.{n}.{n2} on GigabitEthernet0/{intf} from FULL to DOWN")),
                3 => (3, format!("%LINK-3-UPDOWN: Interface GigabitEthernet0/{intf}, changed state to down")),
                4 => (5, format!("%LINK-3-UPDOWN: Interface GigabitEthernet0/{intf}, changed state to up")),
                5 => (4, "%SYS-5-CONFIG_I: Configured from console by admin on vty0 (10.0.0.100)".to_string()),
                6 => (6, format!("%SEC-6-IPACCESSLOGP: list OUTSIDE denied tcp 192.168.1.{n}(12345) -> 10.0.1.{n2}(22), 1 packet")),
                7 => (2, "%PLATFORM-2-TEMP_CRITICAL: Temperature sensor 1 reading 85C exceeds threshold 80C".to_string()),
                8 => (4, format!("%STP-4-TOPOLOGY_CHANGE: Topology change detected on GigabitEthernet0/{intf}")),
                9 => (5, "%HSRP-5-STATECHANGE: GigabitEthernet0/0 Grp 1 state Active -> Standby".to_string()),
                10 => (6, format!("%EIGRP-5-NBRCHANGE: EIGRP-IPv4 1: Neighbor 10.0.{n}.{n2} (GigabitEthernet0/{intf}) is up")),
                11 => (3, format!("%EIGRP-5-NBRCHANGE: EIGRP-IPv4 1: Neighbor 10.0.{n}.{n2} (GigabitEthernet0/{intf}) is down: holding time expired")),
                12 => (5, format!("%LINEPROTO-5-UPDOWN: Line protocol on Interface GigabitEthernet0/{intf}, changed state to up")),
                13 => (4, "%SNMP-4-NOTRAPIP: SNMP trap source not specified, using default".to_string()),
                _ => (6, "%SYS-6-CLOCKUPDATE: System clock has been updated".to_string()),
            };

            let class = self.parser.classify(&text);
            let mut msg = SyslogMessage::new(source_ip, text);
            msg.device_hostname = hostname.to_string();
            msg.facility = 23; // local7
            msg.severity = severity;
            msg.timestamp = now - Duration::minutes(rng.gen_range(0..1440));
            msg.program = "IOS".to_string();
            msg.structured_data
                .insert("category".to_string(), class.category.clone());
            self.buffer.record(msg, &class.category);
        }

        let mut messages = match self.buffer.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_messages_seeded() {
        let mut listener = SyslogListener::new(514, true);
        listener.start().await.unwrap();
        assert_eq!(listener.message_count(), 200);
        listener.stop().await;
    }

    #[tokio::test]
    async fn test_filter_by_severity() {
        let mut listener = SyslogListener::new(514, true);
        listener.start().await.unwrap();
        let severe = listener.messages(None, Some(3), None, None, 500);
        assert!(severe.iter().all(|m| m.severity <= 3));
    }

    #[tokio::test]
    async fn test_severity_distribution() {
        let mut listener = SyslogListener::new(514, true);
        listener.start().await.unwrap();
        let dist = listener.severity_distribution();
        assert!(!dist.is_empty());
        assert_eq!(dist.values().sum::<u64>(), 200);
    }

    #[test]
    fn test_classify_bgp() {
        let listener = SyslogListener::new(514, true);
        let class = listener.classify("%BGP-5-ADJCHANGE: neighbor 10.0.0.2 Down");
        assert_eq!(class.category, "bgp_state_change");
        assert!(class.matched);
    }

    #[test]
    fn test_classify_ospf() {
        let listener = SyslogListener::new(514, true);
        let class = listener.classify(
            "%OSPF-5-ADJCHG: Process 1, Nbr 10.0.1.1 on GigabitEthernet0/0 from FULL to DOWN",
        );
        assert_eq!(class.category, "ospf_state_change");
    }

    #[test]
    fn test_classify_unknown() {
        let listener = SyslogListener::new(514, true);
        let class = listener.classify("Some random log message");
        assert_eq!(class.category, "unclassified");
        assert!(!class.matched);
    }

    #[test]
    fn test_parse_rfc5424() {
        let listener = SyslogListener::new(514, true);
        let msg = listener
            .parse_rfc5424("<134>1 2024-01-01T00:00:00Z router-1 IOS - - Some message")
            .unwrap();
        assert_eq!(msg.facility, 16);
        assert_eq!(msg.severity, 6);
        assert_eq!(msg.device_hostname, "router-1");
        assert_eq!(msg.program, "IOS");
        assert_eq!(msg.message, "Some message");
    }

    #[test]
    fn test_parse_rfc3164() {
        let listener = SyslogListener::new(514, true);
        let msg = listener
            .parse_rfc3164("<34>Oct 11 22:14:15 switch-1 %SYS-5-RESTART: System restarted")
            .unwrap();
        assert_eq!(msg.facility, 4);
        assert_eq!(msg.severity, 2);
        assert_eq!(msg.device_hostname, "switch-1");
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let listener = SyslogListener::new(514, true);
        let mut original = SyslogMessage::new("0.0.0.0", "Interface Gi0/3 flapped");
        original.device_hostname = "router-core-1".to_string();
        original.program = "IOS".to_string();
        original.facility = 23;
        original.severity = 4;
        original.pid = Some(120);

        let rendered = render_rfc5424(&original);
        let parsed = listener.parse_rfc5424(&rendered).unwrap();
        assert_eq!(parsed.facility, original.facility);
        assert_eq!(parsed.severity, original.severity);
        assert_eq!(parsed.device_hostname, original.device_hostname);
        assert_eq!(parsed.program, original.program);
        assert_eq!(parsed.pid, original.pid);
        assert_eq!(parsed.message, original.message);
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(severity_name(0), "emergency");
        assert_eq!(severity_name(7), "debug");
        assert_eq!(severity_name(9), "severity-9");
        assert_eq!(facility_name(23), "local7");
    }
}
