use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

/// Inflight-wifi operators whose status endpoint we know how to read.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderId {
    Gogo,
    Delta,
    United,
    American,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Gogo,
        ProviderId::Delta,
        ProviderId::United,
        ProviderId::American,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            ProviderId::Gogo => "https://wifi.inflightinternet.com/abp/v2/statusTray?fig2=true",
            ProviderId::Delta => "https://wifi.delta.com/api/flight-data",
            ProviderId::United => "https://www.unitedwifi.com/portal/r/getAllSessionData",
            ProviderId::American => "https://www.aainflight.com/api/v1/connectivity/viasat/flight",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown provider: {}", s))
    }
}
