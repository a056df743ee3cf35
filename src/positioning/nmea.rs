//! NMEA 0183 GGA parsing and the serial GPS provider.
//!
//! Only GGA sentences (`$GPGGA`, `$GNGGA`, ...) carry what the cache needs:
//!
//! ```text
//! $GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47
//!        time   lat      N lon       E q sats hdop alt
//! ```
//!
//! Latitude is `ddmm.mmmm`, longitude `dddmm.mmmm`. A fix is valid when the
//! quality field is non-zero and both coordinates are present.

use super::{PositionError, PositionProvider};
use crate::types::Position;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Upper bound on sentences consumed by one poll.
const MAX_SENTENCES_PER_POLL: usize = 16;

/// Longest partial line kept while waiting for its newline. A GGA sentence
/// is at most 82 bytes.
const MAX_SENTENCE_BYTES: usize = 256;

/// Parse one GGA sentence into a fix.
///
/// Returns `None` for other sentence types, bad checksums, malformed fields
/// and fixes with quality 0.
pub fn parse_gga(sentence: &str, observed_at: DateTime<Utc>) -> Option<Position> {
    let body = sentence.trim().strip_prefix('$')?;

    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).ok()?;
            let actual = data.bytes().fold(0u8, |acc, b| acc ^ b);
            if actual != expected {
                return None;
            }
            data
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 10 || !fields[0].ends_with("GGA") {
        return None;
    }

    let fix_quality: u8 = fields[6].parse().ok()?;
    if fix_quality == 0 {
        return None;
    }

    let latitude = parse_coordinate(fields[2], fields[3], 2)?;
    let longitude = parse_coordinate(fields[4], fields[5], 3)?;

    Some(Position {
        latitude,
        longitude,
        altitude: fields[9].parse().unwrap_or(0.0),
        satellites: fields[7].parse().unwrap_or(0),
        fix_quality,
        observed_at,
    })
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    if value.len() <= degree_digits || !value.is_ascii() {
        return None;
    }
    let degrees: f64 = value[..degree_digits].parse().ok()?;
    let minutes: f64 = value[degree_digits..].parse().ok()?;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

/// `read_until(b'\n')` with a bounded line.
///
/// A line that outgrows [`MAX_SENTENCE_BYTES`] (noise, wrong baud rate) is
/// dropped and the reader resyncs on the next newline. Cancel safe: bytes are
/// consumed only after they have been copied into `line`.
async fn read_sentence<R>(reader: &mut R, line: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut read = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(read);
        }
        let (used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (end + 1, true),
            None => (available.len(), false),
        };
        if line.len() + used > MAX_SENTENCE_BYTES {
            line.clear();
        } else {
            line.extend_from_slice(&available[..used]);
        }
        reader.consume(used);
        read += used;
        if complete {
            return Ok(read);
        }
    }
}

/// GPS module on a serial device, read as a line stream.
///
/// The port's baud rate is whatever the OS configured (`stty -F /dev/serial0 9600`).
/// Reads go through tokio's blocking pool; a read still parked on a silent
/// module when the run stops is abandoned by the bounded runtime shutdown.
pub struct NmeaSerialProvider {
    device: PathBuf,
    read_timeout: Duration,
    reader: Option<BufReader<tokio::fs::File>>,
    line_buffer: Vec<u8>,
}

impl NmeaSerialProvider {
    pub fn new(device: impl Into<PathBuf>, read_timeout: Duration) -> Self {
        Self {
            device: device.into(),
            read_timeout,
            reader: None,
            line_buffer: Vec::with_capacity(128),
        }
    }
}

#[async_trait]
impl PositionProvider for NmeaSerialProvider {
    async fn connect(&mut self) -> Result<(), PositionError> {
        let file = tokio::fs::File::open(&self.device).await.map_err(|e| {
            PositionError::Unreachable(format!("{}: {}", self.device.display(), e))
        })?;
        self.reader = Some(BufReader::new(file));
        tracing::info!(device = %self.device.display(), "GPS serial device opened");
        Ok(())
    }

    /// Reads whatever sentences are ready and returns the newest valid fix.
    ///
    /// Waits at most `read_timeout` for the first line. A line cut short by
    /// the timeout stays buffered and is completed on the next poll.
    async fn poll(&mut self) -> Option<Position> {
        let reader = self.reader.as_mut()?;
        let mut latest = None;

        for _ in 0..MAX_SENTENCES_PER_POLL {
            match tokio::time::timeout(
                self.read_timeout,
                read_sentence(reader, &mut self.line_buffer),
            )
            .await
            {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(_)) => {
                    let line = String::from_utf8_lossy(&self.line_buffer);
                    if let Some(fix) = parse_gga(&line, Utc::now()) {
                        latest = Some(fix);
                    }
                    self.line_buffer.clear();
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "GPS read failed");
                    self.line_buffer.clear();
                    break;
                }
            }

            if !reader.buffer().contains(&b'\n') {
                break;
            }
        }

        latest
    }

    async fn close(&mut self) {
        self.reader = None;
    }

    fn name(&self) -> &str {
        "nmea-serial"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    #[test]
    fn parses_reference_sentence() {
        let fix = parse_gga(GGA, Utc::now()).unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_666).abs() < 1e-4);
        assert_eq!(fix.satellites, 8);
        assert_eq!(fix.fix_quality, 1);
        assert!((fix.altitude - 545.4).abs() < 1e-9);
    }

    #[test]
    fn southern_and_western_hemispheres_are_negative() {
        let fix = parse_gga(
            "$GNGGA,010203,0612.000,S,10649.000,W,2,05,1.1,10.0,M,,M,,",
            Utc::now(),
        )
        .unwrap();
        assert!((fix.latitude + 6.2).abs() < 1e-9);
        assert!((fix.longitude + 106.816_666).abs() < 1e-5);
    }

    #[test]
    fn rejects_bad_checksum() {
        let corrupted = GGA.replace("*47", "*48");
        assert!(parse_gga(&corrupted, Utc::now()).is_none());
    }

    #[test]
    fn rejects_quality_zero_and_missing_coordinates() {
        let no_fix = "$GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,";
        assert!(parse_gga(no_fix, Utc::now()).is_none());
        assert!(parse_gga("$GPGGA,123519,,,,,1,04,,,M,,M,,", Utc::now()).is_none());
    }

    #[test]
    fn ignores_other_sentences() {
        let rmc = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        assert!(parse_gga(rmc, Utc::now()).is_none());
        assert!(parse_gga("garbage", Utc::now()).is_none());
        assert!(parse_gga("", Utc::now()).is_none());
    }

    #[test]
    fn missing_altitude_and_satellites_default_to_zero() {
        let sparse = "$GPGGA,123519,4807.038,N,01131.000,E,1,,,,M,,M,,";
        let fix = parse_gga(sparse, Utc::now()).unwrap();
        assert_eq!(fix.satellites, 0);
        assert_eq!(fix.altitude, 0.0);
    }

    #[tokio::test]
    async fn provider_returns_newest_fix_from_device() {
        let mut device = tempfile::NamedTempFile::new().unwrap();
        let gsv = "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00";
        writeln!(device, "{gsv}").unwrap();
        writeln!(device, "{GGA}").unwrap();
        writeln!(device, "$GNGGA,123520,0612.000,S,10649.000,E,1,09,0.9,12.0,M,,M,,").unwrap();
        device.flush().unwrap();

        let mut provider = NmeaSerialProvider::new(device.path(), Duration::from_millis(200));
        provider.connect().await.unwrap();

        let fix = provider.poll().await.unwrap();
        assert!((fix.latitude + 6.2).abs() < 1e-9);
        assert_eq!(fix.satellites, 9);

        // Device drained: nothing new, no error.
        assert!(provider.poll().await.is_none());
    }

    #[tokio::test]
    async fn overlong_noise_is_dropped_and_reader_resyncs() {
        let mut input = vec![b'x'; 4096];
        input.push(b'\n');
        input.extend_from_slice(GGA.as_bytes());
        input.push(b'\n');
        let mut reader = &input[..];
        let mut line = Vec::new();

        read_sentence(&mut reader, &mut line).await.unwrap();
        assert!(line.len() <= MAX_SENTENCE_BYTES);
        line.clear();

        read_sentence(&mut reader, &mut line).await.unwrap();
        let fix = parse_gga(&String::from_utf8_lossy(&line), Utc::now());
        assert_eq!(fix.map(|f| f.satellites), Some(8));
    }

    #[tokio::test]
    async fn unterminated_noise_stays_bounded() {
        let noise = vec![b'~'; 10_000];
        let mut reader = &noise[..];
        let mut line = Vec::new();

        assert_eq!(read_sentence(&mut reader, &mut line).await.unwrap(), 10_000);
        assert!(line.len() <= MAX_SENTENCE_BYTES);
    }

    #[tokio::test]
    async fn missing_device_is_unreachable() {
        let mut provider =
            NmeaSerialProvider::new("/nonexistent/serial0", Duration::from_millis(50));
        assert!(matches!(
            provider.connect().await,
            Err(PositionError::Unreachable(_))
        ));
        assert!(provider.poll().await.is_none());
    }
}
