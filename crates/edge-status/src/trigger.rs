//! `trigger` field values (spec §4.6).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    ThingGroupDeployment,
    LocalDeployment,
    BrokenComponent,
    Reconnect,
    Cadence,
}
