//! Simulator configuration file.
//!
//! ```text
//! <time_slice> <num_cpus> <num_processes>
//! [<ram_bytes> <swap0_bytes> [<swap1_bytes> [<swap2_bytes> [<swap3_bytes>]]]]
//! <start_time> <process_script>
//! ...
//! ```
//!
//! The size line is optional. Numbers are decimal or `0x` hex; `#` starts a
//! comment.

use kernel_info::memory::{
    DEFAULT_RAM_SIZE, DEFAULT_SWAP0_SIZE, MAX_RAM_SIZE, MAX_SWAP_DEVICES, MAX_SWAP_SIZE,
};
use kernel_memory_addresses::PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
    #[error("line {line}: `{token}` is not a number")]
    BadNumber { line: usize, token: String },
    #[error("RAM size {0:#x} exceeds the addressable maximum {max:#x}", max = MAX_RAM_SIZE)]
    RamTooLarge(u64),
    #[error("RAM size {0:#x} does not hold a single page")]
    RamTooSmall(u64),
    #[error("swap device {slot} size {size:#x} exceeds the addressable maximum {max:#x}", max = MAX_SWAP_SIZE)]
    SwapTooLarge { slot: usize, size: u64 },
    #[error("{expected} processes announced but {found} listed")]
    ProcessCount { expected: usize, found: usize },
}

/// One process line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Simulation tick at which the process is admitted.
    pub start_time: u64,
    /// Script file name, relative to the process directory.
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Instructions a process runs before it is put back in the queue.
    pub time_slice: u32,
    pub cpus: usize,
    pub ram_size: u64,
    /// Zero disables a slot.
    pub swap_sizes: [u64; MAX_SWAP_DEVICES],
    pub processes: Vec<ProcessSpec>,
}

impl Config {
    /// # Errors
    /// Any [`ConfigError`].
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, strip_comment(line)))
            .filter(|(_, line)| !line.is_empty())
            .peekable();

        let (line_no, header) = lines.next().ok_or(ConfigError::Malformed {
            line: 1,
            reason: "missing header line",
        })?;
        let [time_slice, cpus, count] = numbers(line_no, header)?[..] else {
            return Err(ConfigError::Malformed {
                line: line_no,
                reason: "header needs time slice, CPU count and process count",
            });
        };
        let time_slice = u32::try_from(time_slice)
            .ok()
            .filter(|&t| t > 0)
            .ok_or(ConfigError::Malformed {
                line: line_no,
                reason: "time slice must be a positive 32-bit number",
            })?;
        let cpus = usize::try_from(cpus)
            .ok()
            .filter(|&c| c > 0)
            .ok_or(ConfigError::Malformed {
                line: line_no,
                reason: "at least one CPU is required",
            })?;
        let count = usize::try_from(count).map_err(|_| ConfigError::Malformed {
            line: line_no,
            reason: "process count out of range",
        })?;

        let mut ram_size = DEFAULT_RAM_SIZE;
        let mut swap_sizes = [0; MAX_SWAP_DEVICES];
        swap_sizes[0] = DEFAULT_SWAP0_SIZE;
        if let Some(&(line_no, line)) = lines.peek()
            && is_size_line(line)
        {
            lines.next();
            let sizes = numbers(line_no, line)?;
            let (&ram, swaps) = sizes.split_first().ok_or(ConfigError::Malformed {
                line: line_no,
                reason: "empty size line",
            })?;
            if swaps.is_empty() || swaps.len() > MAX_SWAP_DEVICES {
                return Err(ConfigError::Malformed {
                    line: line_no,
                    reason: "size line needs RAM and one to four swap sizes",
                });
            }
            ram_size = ram;
            swap_sizes = [0; MAX_SWAP_DEVICES];
            swap_sizes[..swaps.len()].copy_from_slice(swaps);
        }
        check_sizes(ram_size, &swap_sizes)?;

        let processes = lines
            .map(|(line_no, line)| parse_process(line_no, line))
            .collect::<Result<Vec<_>, _>>()?;
        if processes.len() != count {
            return Err(ConfigError::ProcessCount {
                expected: count,
                found: processes.len(),
            });
        }

        Ok(Self {
            time_slice,
            cpus,
            ram_size,
            swap_sizes,
            processes,
        })
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(code, _)| code).trim()
}

/// Decimal or `0x`-prefixed hexadecimal.
#[must_use]
pub fn parse_number(token: &str) -> Option<u64> {
    match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

fn numbers(line: usize, text: &str) -> Result<Vec<u64>, ConfigError> {
    text.split_whitespace()
        .map(|token| {
            parse_number(token).ok_or_else(|| ConfigError::BadNumber {
                line,
                token: token.to_owned(),
            })
        })
        .collect()
}

fn is_size_line(line: &str) -> bool {
    line.split_whitespace().all(|token| parse_number(token).is_some())
}

fn check_sizes(ram: u64, swaps: &[u64; MAX_SWAP_DEVICES]) -> Result<(), ConfigError> {
    if ram > MAX_RAM_SIZE {
        return Err(ConfigError::RamTooLarge(ram));
    }
    if ram < PAGE_SIZE {
        return Err(ConfigError::RamTooSmall(ram));
    }
    match swaps.iter().position(|&size| size > MAX_SWAP_SIZE) {
        Some(slot) => Err(ConfigError::SwapTooLarge {
            slot,
            size: swaps[slot],
        }),
        None => Ok(()),
    }
}

fn parse_process(line: usize, text: &str) -> Result<ProcessSpec, ConfigError> {
    let mut tokens = text.split_whitespace();
    let (Some(start), Some(script), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(ConfigError::Malformed {
            line,
            reason: "process line needs a start time and a script name",
        });
    };
    let start_time = parse_number(start).ok_or_else(|| ConfigError::BadNumber {
        line,
        token: start.to_owned(),
    })?;
    Ok(ProcessSpec {
        start_time,
        script: script.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_line_is_optional() {
        let config = Config::parse("2 1 2\n0 p0\n3 p1\n").unwrap();
        assert_eq!(config.time_slice, 2);
        assert_eq!(config.cpus, 1);
        assert_eq!(config.ram_size, DEFAULT_RAM_SIZE);
        assert_eq!(config.swap_sizes, [DEFAULT_SWAP0_SIZE, 0, 0, 0]);
        assert_eq!(
            config.processes,
            [
                ProcessSpec {
                    start_time: 0,
                    script: "p0".into()
                },
                ProcessSpec {
                    start_time: 3,
                    script: "p1".into()
                },
            ]
        );
    }

    #[test]
    fn size_line_accepts_hex_and_comments() {
        let text = "# demo\n4 2 1\n0x100000 0x80000 65536   # RAM, two swaps\n\n1 proc/s0\n";
        let config = Config::parse(text).unwrap();
        assert_eq!(config.ram_size, 0x10_0000);
        assert_eq!(config.swap_sizes, [0x8_0000, 0x1_0000, 0, 0]);
        assert_eq!(config.processes[0].script, "proc/s0");
    }

    #[test]
    fn oversized_ram_is_rejected() {
        assert_eq!(
            Config::parse("1 1 0\n0x10000000 0x1000000\n"),
            Err(ConfigError::RamTooLarge(0x1000_0000))
        );
        assert_eq!(
            Config::parse("1 1 0\n100 4096\n"),
            Err(ConfigError::RamTooSmall(100))
        );
    }

    #[test]
    fn malformed_input_names_the_line() {
        assert!(matches!(
            Config::parse("1 1\n"),
            Err(ConfigError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            Config::parse("1 0 0\n"),
            Err(ConfigError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            Config::parse("1 1 1\n4096\n0 p\n"),
            Err(ConfigError::Malformed { line: 2, .. })
        ));
        assert_eq!(
            Config::parse("1 1 1\nsoon p0\n"),
            Err(ConfigError::BadNumber {
                line: 2,
                token: "soon".into()
            })
        );
        assert!(matches!(
            Config::parse("1 1 1\n0 p0 7\n"),
            Err(ConfigError::Malformed { line: 2, .. })
        ));
        assert_eq!(
            Config::parse("1 1 2\n0 p0\n"),
            Err(ConfigError::ProcessCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn numbers_parse_in_both_bases() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x2A"), Some(42));
        assert_eq!(parse_number("0X2a"), Some(42));
        assert_eq!(parse_number("0xZZ"), None);
        assert_eq!(parse_number("-1"), None);
    }
}
