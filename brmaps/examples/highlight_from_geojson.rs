// Example: Highlight and municipality maps from inline GeoJSON
// This example writes two tiny datasets to a temporary directory and renders
// a highlight map and a municipality zoom for Pernambuco
use anyhow::Result;
use brmaps::collect::paths::keys;
use brmaps::{Capabilities, MapDriver, MapRequest, PathBundle, RenderConfig, StateCode};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("=== Example: Highlight map from GeoJSON ===\n");

    // Two states, WGS84 coordinates
    let states = r#"
    {
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "abbreviation": "PE", "name": "Pernambuco" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-41.0, -9.5], [-35.0, -9.5], [-35.0, -7.3], [-41.0, -7.3], [-41.0, -9.5]
                    ]]
                }
            },
            {
                "type": "Feature",
                "properties": { "abbreviation": "PB", "name": "Paraíba" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-38.8, -7.3], [-34.8, -7.3], [-34.8, -6.0], [-38.8, -6.0], [-38.8, -7.3]
                    ]]
                }
            }
        ]
    }
    "#;

    // Two municipalities of PE
    let municipalities = r#"
    {
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Petrolina", "population": 386786 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-41.0, -9.5], [-38.0, -9.5], [-38.0, -7.3], [-41.0, -7.3], [-41.0, -9.5]
                    ]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Recife", "population": 1488920 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-38.0, -9.5], [-35.0, -9.5], [-35.0, -7.3], [-38.0, -7.3], [-38.0, -9.5]
                    ]]
                }
            }
        ]
    }
    "#;

    let dir = tempfile::TempDir::new()?;
    let states_path = dir.path().join("estados.geojson");
    let municipalities_path = dir.path().join("municipios_pe.geojson");
    std::fs::write(&states_path, states)?;
    std::fs::write(&municipalities_path, municipalities)?;

    let inputs = PathBundle::new()
        .with(keys::ESTADOS, &states_path)
        .with(keys::MUNICIPIOS, &municipalities_path);

    // No South America base layer: the maps fall back to the ocean colour
    let config = RenderConfig {
        dpi: 100,
        ..RenderConfig::default()
    };
    let capabilities = Capabilities::detect(&config);
    let driver = MapDriver::new(&config, &capabilities);
    let state = StateCode::parse("pe")?;

    let highlight = driver.run(&MapRequest::highlight(
        state.clone(),
        inputs.clone().with(keys::SAIDA, dir.path().join("destaque_pe.png")),
    ))?;
    println!("✓ {}", highlight.title);
    println!("  Output: {}", highlight.output.display());
    println!("  Size: {}x{} px", highlight.size_px.0, highlight.size_px.1);

    let zoom = driver.run(&MapRequest::zoom(
        state,
        inputs.with(keys::SAIDA, dir.path().join("zoom_pe.png")),
    ))?;
    println!("\n✓ {}", zoom.title);
    for layer in &zoom.layers {
        println!("  z={} {}: {} feature(s)", layer.z, layer.name, layer.features);
    }
    println!(
        "  Viewport (EPSG:3857): [{:.0}, {:.0}] - [{:.0}, {:.0}]",
        zoom.viewport.min_x, zoom.viewport.min_y, zoom.viewport.max_x, zoom.viewport.max_y
    );

    println!("\n=== Example completed successfully! ===");
    println!("(images are removed with the temporary directory)");
    Ok(())
}
