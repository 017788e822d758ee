use serde::Deserialize;

/// Decoded AIS records as consumed by the tracking core.
///
/// The wire format is the aisstream.io JSON envelope; anything that fails to
/// decode is dropped before it reaches the vessel registry.

#[derive(Debug, Clone)]
pub struct PositionReport {
    pub mmsi: String,
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground in knots.
    pub sog: f64,
    /// Course over ground in degrees, 0 = north, clockwise.
    pub cog: f64,
    #[allow(dead_code)]
    pub true_heading: Option<f64>,
    #[allow(dead_code)]
    pub nav_status: Option<i64>,
    #[allow(dead_code)]
    pub ts_utc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShipStaticData {
    pub mmsi: String,
    pub name: Option<String>,
    pub call_sign: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AisRecord {
    Position(PositionReport),
    Static(ShipStaticData),
}

impl AisRecord {
    pub fn mmsi(&self) -> &str {
        match self {
            AisRecord::Position(p) => &p.mmsi,
            AisRecord::Static(s) => &s.mmsi,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MessageType")]
    message_type: String,
    #[serde(rename = "MetaData")]
    meta_data: MetaData,
    #[serde(rename = "Message")]
    message: MessageBody,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "MMSI")]
    mmsi: u64,
    #[serde(rename = "ShipName")]
    ship_name: Option<String>,
    #[serde(rename = "time_utc")]
    time_utc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(rename = "PositionReport")]
    position_report: Option<RawPositionReport>,
    #[serde(rename = "ShipStaticData")]
    ship_static_data: Option<RawShipStaticData>,
}

#[derive(Debug, Deserialize)]
struct RawPositionReport {
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Sog")]
    sog: Option<f64>,
    #[serde(rename = "Cog")]
    cog: Option<f64>,
    #[serde(rename = "TrueHeading")]
    true_heading: Option<f64>,
    #[serde(rename = "NavigationalStatus")]
    navigational_status: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawShipStaticData {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "CallSign")]
    call_sign: Option<String>,
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Decode one WebSocket text frame into an AIS record.
///
/// Returns `None` for frames that are not valid JSON, carry an unsupported
/// message type, or miss the body their type promises.
pub fn decode(text: &str) -> Option<AisRecord> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    let mmsi = envelope.meta_data.mmsi.to_string();
    let meta_name = clean_name(envelope.meta_data.ship_name);

    match envelope.message_type.as_str() {
        "PositionReport" => {
            let raw = envelope.message.position_report?;
            Some(AisRecord::Position(PositionReport {
                mmsi,
                name: meta_name,
                lat: raw.latitude,
                lon: raw.longitude,
                sog: raw.sog.unwrap_or(0.0),
                cog: raw.cog.unwrap_or(0.0),
                true_heading: raw.true_heading,
                nav_status: raw.navigational_status,
                ts_utc: envelope.meta_data.time_utc,
            }))
        }
        "ShipStaticData" => {
            let raw = envelope.message.ship_static_data?;
            Some(AisRecord::Static(ShipStaticData {
                mmsi,
                name: clean_name(raw.name).or(meta_name),
                call_sign: clean_name(raw.call_sign),
            }))
        }
        _ => None,
    }
}
