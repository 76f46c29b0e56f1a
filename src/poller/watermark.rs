//! Forward-only Slack timestamp cursor.

/// Sortable form of a Slack `ts` such as `1700000000.000100`.
///
/// Unparseable timestamps map to `None`, which sorts before every valid one.
#[must_use]
pub fn ts_key(ts: &str) -> Option<(u64, u32)> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs = secs.parse().ok()?;
    if frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let micros = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<6}").parse().ok()?
    };
    Some((secs, micros))
}

/// The newest timestamp a poller has seen; never moves backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    raw: String,
    key: (u64, u32),
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            raw: "0".into(),
            key: (0, 0),
        }
    }
}

impl Watermark {
    /// Text form passed to the channel API as the `oldest` bound.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Move forward to `ts` if it is newer. Returns whether it moved.
    pub fn advance(&mut self, ts: &str) -> bool {
        match ts_key(ts) {
            Some(key) if key > self.key => {
                self.key = key;
                ts.clone_into(&mut self.raw);
                true
            }
            _ => false,
        }
    }
}
