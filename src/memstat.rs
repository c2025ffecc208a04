//! Process memory sampling (Linux `/proc/self/statm`, in pages).
use std::io;
use serde::Serialize;

const STATM_PATH: &str = "/proc/self/statm";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStatus {
    pub size: u64,
    pub resident: u64,
    pub shared: u64,
    pub text: u64,
    pub lib: u64,
    pub data: u64,
    pub dirty: u64,
}

impl MemoryStatus {
    pub fn supported() -> bool {
        cfg!(target_os = "linux")
    }

    pub fn sample() -> io::Result<Self> {
        Self::parse(&std::fs::read_to_string(STATM_PATH)?)
    }

    pub fn parse(src: &str) -> io::Result<Self> {
        let mut fields = src.split_whitespace().map(|f| {
            f.parse::<u64>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("statm field `{f}`: {e}")))
        });
        let mut next = || {
            fields
                .next()
                .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short statm line")))
        };
        Ok(Self {
            size: next()?,
            resident: next()?,
            shared: next()?,
            text: next()?,
            lib: next()?,
            data: next()?,
            dirty: next()?,
        })
    }

    /// Log one `--memory--` line.
    pub fn report() {
        match Self::sample() {
            Ok(m) => tracing::info!(
                "--memory-- sz: {} res: {} shr: {} txt: {} lib: {} data: {} dt: {}",
                m.size, m.resident, m.shared, m.text, m.lib, m.data, m.dirty
            ),
            Err(e) => tracing::warn!("could not read {STATM_PATH}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_statm_line() {
        let m = MemoryStatus::parse("4511 1260 975 2 0 418 0\n").unwrap();
        assert_eq!(m.size, 4511);
        assert_eq!(m.resident, 1260);
        assert_eq!(m.data, 418);
        assert_eq!(m.dirty, 0);
    }

    #[test]
    fn rejects_short_or_garbled_lines() {
        assert!(MemoryStatus::parse("1 2 3").is_err());
        assert!(MemoryStatus::parse("1 2 x 4 5 6 7").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn samples_this_process() {
        assert!(MemoryStatus::sample().unwrap().size > 0);
    }
}
