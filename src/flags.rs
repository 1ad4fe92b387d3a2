//! Feature flags handed verbatim to the native build system.
//!
//! A [`FeatureFlagSet`] is an ordered list of `(name, value)` pairs. Names are
//! strategy specific (`enable-android` for configure, `ENABLE_ANDROID` for
//! CMake) but the defaults of both strategies express the same intent:
//! optional database connectors, media frameworks and scripting bindings
//! off, IPv6 and DTLS on, versioned sonames off, Android integration on.
//!
//! Flags are not checked for consistency with each other.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Text(s) => f.write_str(s),
        }
    }
}

/// A single `(name, value)` pair. Serialized as a two-element array so that
/// TOML keeps the declaration order: `["enable-android", true]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag(pub String, pub FlagValue);

impl FeatureFlag {
    pub fn on(name: &str) -> Self {
        Self(name.to_string(), FlagValue::Bool(true))
    }

    pub fn off(name: &str) -> Self {
        Self(name.to_string(), FlagValue::Bool(false))
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self(name.to_string(), FlagValue::Text(value.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &FlagValue {
        &self.1
    }

    /// Render as a configure-script option.
    ///
    /// `enable-x`/`with-x` names flip to `disable-x`/`without-x` when false;
    /// any other boolean name is passed as `--name` when true and dropped when
    /// false. Text values become `--name=value`.
    pub fn to_configure_arg(&self) -> Option<String> {
        let name = self.0.trim_start_matches("--");
        match &self.1 {
            FlagValue::Text(v) => Some(format!("--{}={}", name, v)),
            FlagValue::Bool(true) => Some(format!("--{}", name)),
            FlagValue::Bool(false) => {
                if let Some(rest) = name.strip_prefix("enable-") {
                    Some(format!("--disable-{}", rest))
                } else if let Some(rest) = name.strip_prefix("disable-") {
                    Some(format!("--enable-{}", rest))
                } else if let Some(rest) = name.strip_prefix("with-") {
                    Some(format!("--without-{}", rest))
                } else if let Some(rest) = name.strip_prefix("without-") {
                    Some(format!("--with-{}", rest))
                } else {
                    None
                }
            }
        }
    }

    /// Render as a CMake cache definition.
    pub fn to_cmake_define(&self) -> String {
        match &self.1 {
            FlagValue::Bool(true) => format!("-D{}=ON", self.0),
            FlagValue::Bool(false) => format!("-D{}=OFF", self.0),
            FlagValue::Text(v) => format!("-D{}={}", self.0, v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlagSet(Vec<FeatureFlag>);

impl FeatureFlagSet {
    pub fn new(flags: Vec<FeatureFlag>) -> Self {
        Self(flags)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureFlag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last value set for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.0.iter().rev().find(|f| f.0 == name).map(|f| &f.1)
    }

    pub fn configure_args(&self) -> Vec<String> {
        self.0.iter().filter_map(FeatureFlag::to_configure_arg).collect()
    }

    pub fn cmake_defines(&self) -> Vec<String> {
        self.0.iter().map(FeatureFlag::to_cmake_define).collect()
    }

    /// Flags used by the configure-based build when the port file sets none.
    pub fn autoconf_defaults() -> Self {
        Self(vec![
            FeatureFlag::off("enable-versioned-soname"),
            FeatureFlag::on("enable-android"),
            FeatureFlag::on("with-ssl"),
            FeatureFlag::on("enable-ipv6"),
            FeatureFlag::on("enable-dtls"),
            FeatureFlag::off("enable-static"),
        ])
    }

    /// Flags used by the CMake-based build when the port file sets none.
    pub fn cmake_defaults() -> Self {
        let mut flags = vec![
            FeatureFlag::on("WITH_SSL"),
            FeatureFlag::off("USE_POPT"),
            FeatureFlag::off("USE_SIGCOMP"),
            FeatureFlag::off("USE_FMT"),
            FeatureFlag::off("VERSIONED_SONAME"),
            FeatureFlag::on("ENABLE_ANDROID"),
            FeatureFlag::on("USE_IPV6"),
            FeatureFlag::on("USE_DTLS"),
            FeatureFlag::off("PEDANTIC_STACK"),
        ];
        // Database connectors, media frameworks, scripting bindings and the
        // bundled applications stay off to keep the mobile footprint small.
        for name in [
            "USE_MYSQL",
            "USE_SOCI_POSTGRESQL",
            "USE_SOCI_MYSQL",
            "USE_POSTGRESQL",
            "USE_MAXMIND_GEOIP",
            "RESIP_HAVE_RADCLI",
            "USE_NETSNMP",
            "BUILD_REPRO",
            "BUILD_RETURN",
            "BUILD_REND",
            "BUILD_TFM",
            "BUILD_ICHAT_GW",
            "BUILD_TELEPATHY_CM",
            "BUILD_RECON",
            "USE_SRTP1",
            "BUILD_RECONSERVER",
            "USE_SIPXTAPI",
            "USE_KURENTO",
            "USE_GSTREAMER",
            "USE_LIBWEBRTC",
            "RECON_LOCAL_HW_TESTS",
            "BUILD_P2P",
            "BUILD_PYTHON",
            "BUILD_QPID_PROTON",
            "RESIP_ASSERT_SYSLOG",
        ] {
            flags.push(FeatureFlag::off(name));
        }
        Self(flags)
    }
}

impl FromIterator<FeatureFlag> for FeatureFlagSet {
    fn from_iter<T: IntoIterator<Item = FeatureFlag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
