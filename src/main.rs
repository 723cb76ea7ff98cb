use bevy::prelude::*;
use std::path::Path;
use terrain::{
    TerrainConfig, TerrainError, TerrainPlugin, TerrainViewerWorldXz, TerrainWorld,
    TerrainWorldRes, TileCorner,
};

const CONFIG_PATH: &str = "assets/terrain.ron";

#[derive(Component)]
struct Viewer;

fn main() -> Result<(), TerrainError> {
    let mut app = App::new();
    app.insert_resource(ClearColor(Color::srgb(0.60, 0.80, 0.95)))
        .add_plugins(DefaultPlugins)
        .add_plugins(TerrainPlugin);

    let world = TerrainWorld::from_heightmap_file(load_config()?)?;
    raise_demo_tile(&world)?;

    app.insert_resource(TerrainWorldRes(world))
        .add_systems(Startup, setup_viewer)
        .add_systems(Update, track_viewer);

    if let AppExit::Error(code) = app.run() {
        error!("app exited with code {code}");
    }
    Ok(())
}

fn load_config() -> Result<TerrainConfig, TerrainError> {
    if Path::new(CONFIG_PATH).exists() {
        return TerrainConfig::load_from_ron_file(CONFIG_PATH);
    }
    info!("{CONFIG_PATH} not found, using default terrain config");
    Ok(TerrainConfig::default())
}

fn raise_demo_tile(world: &TerrainWorld) -> Result<(), TerrainError> {
    let address = world.tile_address(2, 2)?;
    let up = Vec3::new(0.0, 5.0, 0.0);
    let deltas: Vec<(TileCorner, Vec3)> = TileCorner::ALL.iter().map(|&c| (c, up)).collect();
    world.resize_tile(address, &deltas)?;
    world.recolor_tile(address, Color::srgb(0.85, 0.35, 0.25))
}

fn setup_viewer(mut commands: Commands, terrain: Res<TerrainWorldRes>) {
    let config = terrain.0.config();
    let extent = config.world_extent_tiles().as_vec2() * config.tile_size;
    let center = Vec3::new(extent.x * 0.5, 0.0, extent.y * 0.5);
    let distance = extent.max_element().max(10.0);

    commands.spawn((
        Viewer,
        Camera3d::default(),
        Transform::from_translation(center + Vec3::new(0.0, distance * 0.6, -distance * 0.6))
            .looking_at(center, Vec3::Y),
    ));
}

fn track_viewer(
    q_viewer: Query<&Transform, With<Viewer>>,
    mut viewer_xz: ResMut<TerrainViewerWorldXz>,
) {
    let Ok(transform) = q_viewer.single() else {
        return;
    };
    // Stream around the point the camera looks at on the ground plane.
    let forward = transform.forward();
    let focus = if forward.y < -f32::EPSILON {
        transform.translation + *forward * (-transform.translation.y / forward.y)
    } else {
        transform.translation
    };
    viewer_xz.0 = focus.xz();
}
