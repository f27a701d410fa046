//! Per-spot feature table (CSV).

use std::io::Write;

use crate::error::ExportError;
use crate::model::{Spot, TrackId, TrackModel};

/// Column header; order is fixed.
pub const HEADER: [&str; 19] = [
    "ID",
    "TRACK_ID",
    "QUALITY",
    "POSITION_X",
    "POSITION_Y",
    "POSITION_Z",
    "POSITION_T",
    "FRAME",
    "RADIUS",
    "VISIBILITY",
    "MANUAL_SPOT_COLOR",
    "MEAN_INTENSITY_CH1",
    "MEDIAN_INTENSITY_CH1",
    "MIN_INTENSITY_CH1",
    "MAX_INTENSITY_CH1",
    "TOTAL_INTENSITY_CH1",
    "STD_INTENSITY_CH1",
    "CONTRAST_CH1",
    "SNR_CH1",
];

/// Format a float the way the table's consumers expect: shortest text that
/// reads back to the same value, always with a decimal point, and `NaN`,
/// `Infinity`, `-Infinity` for non-finite values.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

fn spot_record(spot: &Spot, track: TrackId) -> [String; 19] {
    let i = &spot.intensity;
    [
        spot.id.to_string(),
        track.to_string(),
        format_float(spot.quality),
        format_float(spot.position.x),
        format_float(spot.position.y),
        format_float(spot.position.z),
        format_float(spot.time),
        spot.frame.to_string(),
        format_float(spot.radius),
        "1".to_string(),
        String::new(),
        format_float(i.mean),
        format_float(i.median),
        format_float(i.min),
        format_float(i.max),
        format_float(i.total),
        format_float(i.std),
        format_float(i.contrast),
        format_float(i.snr),
    ]
}

/// Write one row per visible spot of every visible track, tracks in
/// ascending id and spots in time order. Always writes the header.
pub fn write_feature_table<W: Write>(model: &TrackModel, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(HEADER)?;
    for track in model.visible_tracks() {
        for spot in model.track_spots(track.id).filter(|s| s.is_visible()) {
            csv.write_record(spot_record(spot, track.id))?;
        }
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Render the table into memory.
pub fn render_feature_table(model: &TrackModel) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_feature_table(model, &mut buffer)?;
    Ok(buffer)
}
