//! JSON snapshots of a caption session

use serde::Serialize;

use crate::captions::Captions;
use crate::types::{EngineStatus, PipelineState};

/// JSON structure for the selected caption service
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceJson {
    pub program: u16,
    pub pid:     u16,
    pub one_seg: bool,
}

/// One report line
#[derive(Serialize, Debug, Clone)]
pub struct CaptionReport {
    pub timestamp: String,
    pub tot_time:  String,
    pub captions:  String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service:   Option<ServiceJson>,
    pub state:     PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:     Option<String>,
    pub status:    EngineStatus,
}

/// Report generator for caption sessions
pub struct Reporter;

impl Reporter {
    pub fn create_report(captions: &Captions) -> CaptionReport {
        CaptionReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tot_time: captions.get_tot_time(),
            captions: captions.get_stocked_captions(),
            service: captions.caption_service().map(|s| ServiceJson {
                program: s.program_number,
                pid: s.pid,
                one_seg: s.one_seg,
            }),
            state: captions.state(),
            error: captions.last_error().map(str::to_owned),
            status: captions.status(),
        }
    }

    /// Single-line JSON for streaming output
    pub fn to_json_line(report: &CaptionReport) -> anyhow::Result<String> {
        Ok(serde_json::to_string(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptionsConfig;

    #[test]
    fn report_of_idle_session() {
        let captions = Captions::with_config(
            "前回",
            CaptionsConfig { start_streaming_on_open: false, ..CaptionsConfig::default() },
        );
        let report = Reporter::create_report(&captions);
        let line = Reporter::to_json_line(&report).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(v["captions"], "前回");
        assert_eq!(v["tot_time"], "");
        assert_eq!(v["state"], "Built");
        assert_eq!(v["status"]["packets"], 0);
        assert!(v.get("service").is_none());
        assert!(v.get("error").is_none());
    }
}
