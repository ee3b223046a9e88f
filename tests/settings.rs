#![cfg(feature = "serde-serialize")]

use fisheye_unwrap::{EngineSettings, Layout, Sampling, TileGrid, ViewAngles};

#[test]
fn missing_fields_use_defaults() {
    let settings: EngineSettings = serde_json::from_str(
        r#"{
            "views": [{ "pan": 90.0 }, { "elevation": 20.0, "fov": 60.0 }],
            "layout": { "Grid": { "columns": 2 } }
        }"#,
    )
    .unwrap();
    assert_eq!(
        settings.views,
        vec![
            ViewAngles::new(90.0, 50.0, 95.0),
            ViewAngles::new(0.0, 20.0, 60.0)
        ]
    );
    assert_eq!(settings.layout, Layout::Grid { columns: 2 });
    assert_eq!((settings.width, settings.height), (480, 360));
    assert_eq!(settings.sampling, Sampling::Unit);
    assert_eq!(settings.tiles, TileGrid::quadrants());

    let empty: EngineSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, EngineSettings::default());
}

#[test]
fn settings_survive_json() {
    let settings = EngineSettings {
        sampling: Sampling::Ratio {
            horizontal: 1.5,
            vertical: 2.0,
        },
        tiles: TileGrid::new(1, 4),
        ..EngineSettings::default()
    };
    let json = serde_json::to_string(&settings).unwrap();
    let parsed: EngineSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, settings);
}
