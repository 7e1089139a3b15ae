//! Tiered LLM provider selection.
//!
//! Candidates are probed in a fixed priority order: local ollama, remote
//! ollama, then the hosted openrouter API. The first successful probe wins
//! and nothing is retried within one resolution. The local and remote tiers
//! are only attempted while the escalation switch is on; openrouter is
//! always probed. No reachable tier is fatal for the process.

use std::net::{TcpStream, ToSocketAddrs};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::error::Error;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_PROBE_HOST: &str = "openrouter.ai";
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);
const LOCAL_OLLAMA_BASE: &str = "http://localhost:11434";

/// Which tier is answering questions. Disclosed through the API because
/// privacy and latency differ per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Remote,
    Openrouter,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Remote => "remote",
            Tier::Openrouter => "openrouter",
        }
    }
}

/// A bound model: tier tag plus everything needed to call it.
#[derive(Debug, Clone)]
pub struct LlmHandle {
    pub tier: Tier,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

/// One fallback candidate: a cheap reachability probe plus the binding
/// constructed only when the probe succeeds.
pub struct Candidate {
    pub tier: Tier,
    pub probe: Box<dyn Fn() -> bool>,
    pub bind: Box<dyn Fn() -> LlmHandle>,
}

/// Evaluate candidates in order; the first successful probe wins.
pub fn resolve(candidates: Vec<Candidate>) -> Option<LlmHandle> {
    for candidate in candidates {
        tracing::info!("Probing {} model tier", candidate.tier.as_str());
        if (candidate.probe)() {
            tracing::info!("Selected {} model tier", candidate.tier.as_str());
            return Some((candidate.bind)());
        }
        tracing::info!("{} model tier unavailable", candidate.tier.as_str());
    }
    None
}

/// Build the candidate list from the config and resolve it.
///
/// Fails with [`Error::NoModelAvailable`]; at startup the caller treats
/// this as fatal rather than running with no model.
pub fn choose_model(config: &Config) -> Result<LlmHandle> {
    let mut candidates = Vec::new();

    if config.models.escalation {
        let local_model = config.models.ollama.local.clone();
        candidates.push(Candidate {
            tier: Tier::Local,
            probe: Box::new(probe_local_ollama),
            bind: Box::new(move || LlmHandle {
                tier: Tier::Local,
                model: local_model.clone(),
                base_url: LOCAL_OLLAMA_BASE.to_string(),
                api_key: None,
            }),
        });

        let remote_base = config.models.ollama.base_url.clone();
        let remote_model = config.models.ollama.remote.clone();
        let probe_base = remote_base.clone();
        candidates.push(Candidate {
            tier: Tier::Remote,
            probe: Box::new(move || match host_port(&probe_base) {
                Some((host, port)) => probe_tcp(&host, port),
                None => {
                    tracing::warn!("Cannot parse remote ollama base_url {probe_base:?}");
                    false
                }
            }),
            bind: Box::new(move || LlmHandle {
                tier: Tier::Remote,
                model: remote_model.clone(),
                base_url: remote_base.clone(),
                api_key: None,
            }),
        });
    }

    let openrouter_model = config.models.openrouter.low.clone();
    let openrouter_key = config.keys.openrouter.clone();
    candidates.push(Candidate {
        tier: Tier::Openrouter,
        probe: Box::new(|| probe_tcp(OPENROUTER_PROBE_HOST, 443)),
        bind: Box::new(move || LlmHandle {
            tier: Tier::Openrouter,
            model: openrouter_model.clone(),
            base_url: OPENROUTER_API_BASE.to_string(),
            api_key: openrouter_key.clone(),
        }),
    });

    resolve(candidates).ok_or_else(|| Error::NoModelAvailable.into())
}

/// A local ollama install answers `ollama --version`.
fn probe_local_ollama() -> bool {
    Command::new("ollama")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Raw TCP connect with a bounded timeout.
fn probe_tcp(host: &str, port: u16) -> bool {
    let Ok(addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok() {
            return true;
        }
    }
    false
}

fn host_port(base_url: &str) -> Option<(String, u16)> {
    let url = reqwest::Url::parse(base_url).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn stub(tier: Tier, probe_result: bool) -> Candidate {
        let model = format!("{}-model", tier.as_str());
        Candidate {
            tier,
            probe: Box::new(move || probe_result),
            bind: Box::new(move || LlmHandle {
                tier,
                model: model.clone(),
                base_url: "http://stub".to_string(),
                api_key: None,
            }),
        }
    }

    #[test]
    fn test_first_successful_probe_wins() {
        let handle = resolve(vec![
            stub(Tier::Local, true),
            stub(Tier::Remote, true),
            stub(Tier::Openrouter, true),
        ])
        .unwrap();
        assert_eq!(handle.tier, Tier::Local);
    }

    #[test]
    fn test_falls_through_to_openrouter() {
        // Local and remote probes fail; the hosted tier must be selected
        let handle = resolve(vec![
            stub(Tier::Local, false),
            stub(Tier::Remote, false),
            stub(Tier::Openrouter, true),
        ])
        .unwrap();
        assert_eq!(handle.tier, Tier::Openrouter);
        assert_eq!(handle.model, "openrouter-model");
    }

    #[test]
    fn test_no_candidate_succeeds_is_none() {
        assert!(resolve(vec![
            stub(Tier::Local, false),
            stub(Tier::Remote, false),
            stub(Tier::Openrouter, false),
        ])
        .is_none());
    }

    #[test]
    fn test_later_probes_not_run_after_success() {
        let probed = Rc::new(Cell::new(false));
        let flag = probed.clone();
        let spy = Candidate {
            tier: Tier::Openrouter,
            probe: Box::new(move || {
                flag.set(true);
                true
            }),
            bind: Box::new(|| LlmHandle {
                tier: Tier::Openrouter,
                model: "m".to_string(),
                base_url: "http://stub".to_string(),
                api_key: None,
            }),
        };
        let handle = resolve(vec![stub(Tier::Local, true), spy]).unwrap();
        assert_eq!(handle.tier, Tier::Local);
        assert!(!probed.get(), "Probe after a success must not run");
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Tier::Local).unwrap(), "local");
        assert_eq!(serde_json::to_value(Tier::Remote).unwrap(), "remote");
        assert_eq!(
            serde_json::to_value(Tier::Openrouter).unwrap(),
            "openrouter"
        );
    }

    #[test]
    fn test_host_port_parsing() {
        assert_eq!(
            host_port("http://10.0.0.5:11434"),
            Some(("10.0.0.5".to_string(), 11434))
        );
        assert_eq!(
            host_port("https://openrouter.ai"),
            Some(("openrouter.ai".to_string(), 443))
        );
        assert_eq!(host_port("not a url"), None);
    }
}
