use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::core::{ComponentLogger, LoadSample, LogContext, WatchError, WatchResult};

pub const DEFAULT_FEED_URL: &str = "https://api.misoenergy.org/MISORTWDDataBroker/DataBrokerServices.asmx?messageType=gettotalload&returnType=json";

/// Anything that can report the most recent load sample.
pub trait LoadSource {
    fn fetch_latest(&mut self) -> WatchResult<LoadSample>;
}

// LoadInfo -> FiveMinTotalLoad[] -> Load -> { Time, Value }
#[derive(Debug, Deserialize)]
struct LoadResponse {
    #[serde(rename = "LoadInfo")]
    load_info: Option<LoadInfo>,
}

#[derive(Debug, Deserialize)]
struct LoadInfo {
    #[serde(rename = "FiveMinTotalLoad")]
    five_min_total_load: Option<Vec<LoadEntry>>,
}

#[derive(Debug, Deserialize)]
struct LoadEntry {
    #[serde(rename = "Load")]
    load: Option<LoadPoint>,
}

#[derive(Debug, Deserialize)]
struct LoadPoint {
    #[serde(rename = "Time")]
    time: Option<Value>,
    #[serde(rename = "Value")]
    value: Option<Value>,
}

/// Extracts the last sample of the five-minute total load series.
pub fn parse_latest(body: &str) -> WatchResult<LoadSample> {
    let response: LoadResponse = serde_json::from_str(body)
        .map_err(|e| WatchError::data(format!("response is not the expected JSON: {}", e)))?;

    let entries = response
        .load_info
        .ok_or_else(|| WatchError::data("missing LoadInfo"))?
        .five_min_total_load
        .ok_or_else(|| WatchError::data("missing LoadInfo.FiveMinTotalLoad"))?;

    let point = entries
        .into_iter()
        .last()
        .ok_or_else(|| WatchError::data("FiveMinTotalLoad is empty"))?
        .load
        .ok_or_else(|| WatchError::data("latest entry has no Load"))?;

    let timestamp = match point.time {
        Some(Value::String(time)) if !time.trim().is_empty() => time,
        Some(Value::Null) | None => return Err(WatchError::data("latest Load has no Time")),
        Some(other) => {
            return Err(WatchError::data(format!(
                "latest Load has an unusable Time: {}",
                other
            )));
        }
    };

    let (load, load_text) = match point.value {
        Some(Value::Number(n)) => (n.as_f64(), n.to_string()),
        Some(Value::String(text)) => (parse_load_text(&text), text),
        _ => (None, String::new()),
    };
    let load = load.ok_or_else(|| WatchError::data("latest Load has no numeric Value"))?;

    Ok(LoadSample::with_text(timestamp, load, load_text))
}

fn parse_load_text(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fetches the MISO real-time total load feed over HTTP.
pub struct HttpLoadSource {
    url: String,
    agent: ureq::Agent,
    ctx: LogContext,
}

impl HttpLoadSource {
    pub fn new(url: impl Into<String>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();

        Self {
            url: url.into(),
            agent,
            ctx: LogContext::new("load_in", "miso"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ComponentLogger for HttpLoadSource {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

impl LoadSource for HttpLoadSource {
    fn fetch_latest(&mut self) -> WatchResult<LoadSample> {
        self.debug(&format!("GET {}", self.url));

        let response = match self.agent.get(&self.url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                return Err(WatchError::network(
                    "fetch",
                    format!("http status {} {}", status, resp.status_text()),
                ));
            }
            Err(e) => return Err(WatchError::network("fetch", e)),
        };

        let body = response
            .into_string()
            .map_err(|e| WatchError::network("fetch", format!("failed to read body: {}", e)))?;

        let sample = parse_latest(&body)?;
        self.debug(&format!("latest sample {}", sample));
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mail_out::Email;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn body(entries: &str) -> String {
        format!(r#"{{"LoadInfo": {{"RefId": "x", "FiveMinTotalLoad": [{}]}}}}"#, entries)
    }

    #[test]
    fn takes_last_entry() {
        let body = body(
            r#"{"Load": {"Time": "12:00", "Value": "70000"}},
               {"Load": {"Time": "12:05", "Value": "71234.5"}}"#,
        );

        let sample = parse_latest(&body).unwrap();
        assert_eq!(sample, LoadSample::new("12:05", 71234.5));
    }

    #[test]
    fn accepts_numeric_and_grouped_values() {
        let numeric = body(r#"{"Load": {"Time": "12:05", "Value": 52000}}"#);
        assert_eq!(parse_latest(&numeric).unwrap().load, 52000.0);

        let grouped = body(r#"{"Load": {"Time": "12:05", "Value": "52,000"}}"#);
        assert_eq!(parse_latest(&grouped).unwrap().load, 52000.0);
    }

    #[test]
    fn keeps_published_value_text() {
        let grouped = body(r#"{"Load": {"Time": "2024-01-01T00:10", "Value": "52,000"}}"#);
        let sample = parse_latest(&grouped).unwrap();

        assert_eq!(sample.load_text, "52,000");
        assert_eq!(sample.load, 52000.0);

        let email = Email::for_sample(
            "sender@example.com".parse().unwrap(),
            "ops@example.com".parse().unwrap(),
            &sample,
        );
        assert!(email.body.contains("52,000 MW"));

        let trailing_zero = body(r#"{"Load": {"Time": "12:05", "Value": "71234.50"}}"#);
        assert_eq!(parse_latest(&trailing_zero).unwrap().load_text, "71234.50");
    }

    #[test]
    fn missing_pieces_are_data_unavailable() {
        let cases = [
            "not json".to_string(),
            "{}".to_string(),
            r#"{"LoadInfo": {}}"#.to_string(),
            body(""),
            body(r#"{"Other": 1}"#),
            body(r#"{"Load": {"Value": "1"}}"#),
            body(r#"{"Load": {"Time": null, "Value": "1"}}"#),
            body(r#"{"Load": {"Time": 1205, "Value": "1"}}"#),
            body(r#"{"Load": {"Time": "12:05"}}"#),
            body(r#"{"Load": {"Time": "12:05", "Value": "n/a"}}"#),
        ];

        for case in cases {
            let err = parse_latest(&case).unwrap_err();
            assert!(
                matches!(err, WatchError::DataUnavailable { .. }),
                "{case} -> {err}"
            );
        }
    }

    /// Answers a single request with `status_line` and `payload`.
    fn serve_once(status_line: &'static str, payload: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                payload.len(),
                payload
            );
            let _ = stream.write_all(response.as_bytes());
        });

        format!("http://{}/feed", addr)
    }

    fn local_source(url: String) -> HttpLoadSource {
        HttpLoadSource::new(url, Duration::from_secs(2), Duration::from_secs(2))
    }

    #[test]
    fn server_error_status_is_network_failure() {
        let mut source = local_source(serve_once("500 Internal Server Error", "{}"));

        let err = source.fetch_latest().unwrap_err();
        match err {
            WatchError::NetworkFailure { operation, message } => {
                assert_eq!(operation, "fetch");
                assert!(message.contains("http status 500"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ok_status_with_bad_document_is_data_unavailable() {
        let mut source = local_source(serve_once("200 OK", r#"{"LoadInfo": {"FiveMinTotalLoad": []}}"#));

        let err = source.fetch_latest().unwrap_err();
        assert!(matches!(err, WatchError::DataUnavailable { .. }), "{err}");
    }

    #[test]
    fn ok_status_with_document_yields_sample() {
        let mut source = local_source(serve_once(
            "200 OK",
            r#"{"LoadInfo": {"FiveMinTotalLoad": [{"Load": {"Time": "12:05", "Value": "70,100"}}]}}"#,
        ));

        let sample = source.fetch_latest().unwrap();
        assert_eq!(sample, LoadSample::with_text("12:05", 70100.0, "70,100"));
    }

    #[test]
    fn unreachable_host_is_network_failure() {
        let mut source = HttpLoadSource::new(
            "http://127.0.0.1:9/feed",
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        let err = source.fetch_latest().unwrap_err();
        assert!(matches!(err, WatchError::NetworkFailure { .. }));
    }
}
