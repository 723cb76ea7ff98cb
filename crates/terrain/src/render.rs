use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use glam::{Vec2, Vec3};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::material::{MaterialId, TerrainMaterial};
use crate::mesh::ChunkModel;
use crate::telemetry::{ViewerChunkTracker, ViewerTelemetry};
use crate::types::ChunkKey;
use crate::vertex::{VertexAttribute, unpack_color};
use crate::world::TerrainWorld;

/// Everything the renderer needs to draw one chunk.
#[derive(Debug)]
pub struct ChunkRenderCache {
    pub key: ChunkKey,
    pub origin: Vec3,
    pub batches: Vec<RenderBatch>,
}

/// The parts of a chunk bound to one material.
#[derive(Debug)]
pub struct RenderBatch {
    pub material: Arc<TerrainMaterial>,
    pub mesh: Mesh,
}

impl ChunkRenderCache {
    /// Groups parts by material, in order of first use. Every batch mesh
    /// carries the whole vertex set and only its own parts' indices.
    pub fn from_model(model: &ChunkModel) -> Self {
        let vertices = model.vertices();
        let count = vertices.vertex_count();

        let positions: Vec<[f32; 3]> = (0..count)
            .map(|i| vertices.position(i).unwrap_or(Vec3::ZERO).to_array())
            .collect();
        let colors: Vec<[f32; 4]> = (0..count)
            .map(|i| match vertices.attribute(i, VertexAttribute::ColorPacked) {
                Some(packed) => unpack_color(packed[0]).to_linear().to_f32_array(),
                None => [1.0; 4],
            })
            .collect();
        let uvs: Vec<[f32; 2]> = (0..count)
            .map(|i| {
                vertices
                    .attribute(i, VertexAttribute::TexCoord)
                    .map(Vec2::from_slice)
                    .unwrap_or(Vec2::ZERO)
                    .to_array()
            })
            .collect();

        let mut groups: Vec<(Arc<TerrainMaterial>, Vec<u32>)> = Vec::new();
        for part in model.parts() {
            let Some(range) = model
                .indices()
                .get(part.index_offset..part.index_offset + part.index_count)
            else {
                warn!("mesh part {} points past the index buffer", part.id);
                continue;
            };
            match groups
                .iter_mut()
                .find(|(material, _)| material.id() == part.material.id())
            {
                Some((_, indices)) => indices.extend_from_slice(range),
                None => groups.push((Arc::clone(&part.material), range.to_vec())),
            }
        }

        let batches = groups
            .into_iter()
            .map(|(material, indices)| RenderBatch {
                mesh: batch_mesh(positions.clone(), colors.clone(), uvs.clone(), indices),
                material,
            })
            .collect();

        Self {
            key: model.key(),
            origin: model.origin(),
            batches,
        }
    }
}

fn batch_mesh(
    positions: Vec<[f32; 3]>,
    colors: Vec<[f32; 4]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

// --- Resources ---

#[derive(Resource)]
pub struct TerrainWorldRes(pub TerrainWorld);

/// Set by the root game crate to indicate where the viewer is (XZ plane).
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct TerrainViewerWorldXz(pub Vec2);

#[derive(Component)]
pub struct TerrainChunk {
    pub key: ChunkKey,
}

struct LoadedChunk {
    cache: Arc<ChunkRenderCache>,
    entities: Vec<Entity>,
}

#[derive(Resource, Default)]
pub struct LoadedChunkEntities {
    entries: HashMap<ChunkKey, LoadedChunk>,
}

impl LoadedChunkEntities {
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Resource, Default)]
pub struct TerrainMaterialHandles {
    handles: HashMap<MaterialId, Handle<StandardMaterial>>,
}

impl TerrainMaterialHandles {
    fn handle_for(
        &mut self,
        material: &TerrainMaterial,
        materials: &mut Assets<StandardMaterial>,
        asset_server: &AssetServer,
    ) -> Handle<StandardMaterial> {
        self.handles
            .entry(material.id())
            .or_insert_with(|| {
                materials.add(StandardMaterial {
                    base_color: material.tint,
                    base_color_texture: material
                        .texture
                        .as_ref()
                        .map(|path| asset_server.load(path.clone())),
                    perceptual_roughness: 1.0,
                    unlit: true,
                    ..default()
                })
            })
            .clone()
    }

    /// Forgets materials no loaded chunk draws with, so their assets can be freed.
    fn retain_used(&mut self, loaded: &LoadedChunkEntities) {
        let used: HashSet<MaterialId> = loaded
            .entries
            .values()
            .flat_map(|entry| entry.cache.batches.iter().map(|batch| batch.material.id()))
            .collect();
        self.handles.retain(|id, _| used.contains(id));
    }
}

/// Chunk and tile under the viewer, for debug overlays.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct TerrainTelemetry {
    pub current: Option<ViewerTelemetry>,
    tracker: ViewerChunkTracker,
}

// --- Systems ---

/// Makes the spawned chunk entities mirror `TerrainWorld::nearby`.
pub fn sync_nearby_chunks(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut material_handles: ResMut<TerrainMaterialHandles>,
    asset_server: Res<AssetServer>,
    terrain: Option<Res<TerrainWorldRes>>,
    viewer: Res<TerrainViewerWorldXz>,
    mut loaded: ResMut<LoadedChunkEntities>,
) {
    let Some(terrain) = terrain else {
        return;
    };

    let visible = terrain.0.nearby(viewer.0.x, viewer.0.y);
    let visible_keys: HashSet<ChunkKey> = visible.iter().map(|cache| cache.key).collect();

    let before = loaded.entries.len();
    loaded.entries.retain(|key, entry| {
        if visible_keys.contains(key) {
            return true;
        }
        for entity in entry.entities.drain(..) {
            commands.entity(entity).despawn();
        }
        false
    });
    let mut changed = loaded.entries.len() != before;

    for cache in visible {
        if let Some(entry) = loaded.entries.get(&cache.key) {
            if Arc::ptr_eq(&entry.cache, &cache) {
                continue;
            }
        }

        // The chunk was edited since it was spawned.
        if let Some(stale) = loaded.entries.remove(&cache.key) {
            for entity in stale.entities {
                commands.entity(entity).despawn();
            }
        }

        let entities = cache
            .batches
            .iter()
            .map(|batch| {
                let material =
                    material_handles.handle_for(&batch.material, &mut materials, &asset_server);
                commands
                    .spawn((
                        TerrainChunk { key: cache.key },
                        Mesh3d(meshes.add(batch.mesh.clone())),
                        MeshMaterial3d(material),
                        Transform::from_translation(cache.origin),
                    ))
                    .id()
            })
            .collect();

        loaded.entries.insert(cache.key, LoadedChunk { cache, entities });
        changed = true;
    }

    if changed {
        material_handles.retain_used(&loaded);
    }
}

pub fn update_terrain_telemetry(
    terrain: Option<Res<TerrainWorldRes>>,
    viewer: Res<TerrainViewerWorldXz>,
    mut telemetry: ResMut<TerrainTelemetry>,
) {
    let Some(terrain) = terrain else {
        return;
    };

    let now = terrain.0.telemetry(viewer.0.x, viewer.0.y);
    if telemetry.tracker.update(now.chunk) {
        debug!("viewer entered chunk {}", now.chunk);
    }
    telemetry.current = Some(now);
}

pub fn debug_lines_enabled(terrain: Option<Res<TerrainWorldRes>>) -> bool {
    terrain.is_some_and(|t| t.0.config().debug_lines)
}

/// Outlines every spawned chunk and draws the world axes at the origin.
pub fn draw_chunk_borders(
    mut gizmos: Gizmos,
    terrain: Option<Res<TerrainWorldRes>>,
    loaded: Res<LoadedChunkEntities>,
) {
    let Some(terrain) = terrain else {
        return;
    };

    let size = terrain.0.config().chunk_world_size();
    let border = Color::srgb(1.0, 0.85, 0.1);
    for entry in loaded.entries.values() {
        let o = entry.cache.origin;
        let corners = [
            o,
            o + Vec3::X * size,
            o + Vec3::new(size, 0.0, size),
            o + Vec3::Z * size,
        ];
        for i in 0..corners.len() {
            gizmos.line(corners[i], corners[(i + 1) % corners.len()], border);
        }
    }

    gizmos.line(Vec3::ZERO, Vec3::X * 10.0, Color::srgb(1.0, 0.0, 0.0));
    gizmos.line(Vec3::ZERO, Vec3::Y * 10.0, Color::srgb(0.0, 1.0, 0.0));
    gizmos.line(Vec3::ZERO, Vec3::Z * 10.0, Color::srgb(0.0, 0.0, 1.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::recolor_tile;
    use crate::mesh::build_chunk_model;
    use crate::test_support::{ramp_heights, small_config, white_material};
    use crate::types::TileAddress;
    use crate::world::TerrainWorld;

    fn model() -> ChunkModel {
        let config = small_config();
        build_chunk_model(&ramp_heights(&config), &config, ChunkKey::new(2, 1), &white_material())
            .unwrap()
    }

    fn index_count(mesh: &Mesh) -> usize {
        mesh.indices().map(|i| i.len()).unwrap_or(0)
    }

    #[test]
    fn shared_material_gives_one_batch() {
        let model = model();
        let cache = ChunkRenderCache::from_model(&model);

        assert_eq!(cache.key, ChunkKey::new(2, 1));
        assert_eq!(cache.origin, Vec3::new(8.0, 0.0, 4.0));
        assert_eq!(cache.batches.len(), 1);
        let mesh = &cache.batches[0].mesh;
        assert_eq!(mesh.count_vertices(), 16 * 4);
        assert_eq!(index_count(mesh), 16 * 6);
    }

    #[test]
    fn recolored_tile_gets_its_own_batch() {
        let model = recolor_tile(&model(), 3, 0, Color::srgb(0.0, 0.0, 1.0)).unwrap();
        let cache = ChunkRenderCache::from_model(&model);

        assert_eq!(cache.batches.len(), 2);
        assert_eq!(index_count(&cache.batches[0].mesh), 15 * 6);
        assert_eq!(index_count(&cache.batches[1].mesh), 6);
        assert_eq!(cache.batches[1].material.tint, Color::srgb(0.0, 0.0, 1.0));
    }

    #[test]
    fn vertex_colors_are_unpacked() {
        let cache = ChunkRenderCache::from_model(&model());
        let mesh = &cache.batches[0].mesh;
        let Some(bevy::mesh::VertexAttributeValues::Float32x4(colors)) =
            mesh.attribute(Mesh::ATTRIBUTE_COLOR)
        else {
            panic!("missing vertex colors");
        };
        assert!(colors.iter().all(|c| c[0] > 0.99 && c[1] > 0.99 && c[2] > 0.99));
    }

    fn sync_app(viewer: Vec2) -> App {
        let config = small_config();
        let world = TerrainWorld::new(config.clone(), white_material()).unwrap();
        world.generate(&ramp_heights(&config)).unwrap();

        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<StandardMaterial>()
            .init_resource::<LoadedChunkEntities>()
            .init_resource::<TerrainMaterialHandles>()
            .insert_resource(TerrainViewerWorldXz(viewer))
            .insert_resource(TerrainWorldRes(world))
            .add_systems(Update, sync_nearby_chunks);
        app
    }

    fn spawned(app: &mut App) -> Vec<(ChunkKey, Entity)> {
        let mut query = app.world_mut().query::<(Entity, &TerrainChunk)>();
        let mut out: Vec<(ChunkKey, Entity)> = query
            .iter(app.world())
            .map(|(entity, chunk)| (chunk.key, entity))
            .collect();
        out.sort();
        out
    }

    fn keys(spawned: &[(ChunkKey, Entity)]) -> Vec<ChunkKey> {
        spawned.iter().map(|(key, _)| *key).collect()
    }

    fn recolor(app: &App, tile_x: i32, tile_z: i32, tint: Color) {
        let world = &app.world().resource::<TerrainWorldRes>().0;
        let address: TileAddress = world.tile_address(tile_x, tile_z).unwrap();
        world.recolor_tile(address, tint).unwrap();
    }

    #[test]
    fn spawned_chunks_follow_the_viewer() {
        let mut app = sync_app(Vec2::ZERO);
        app.update();

        let first = spawned(&mut app);
        assert_eq!(
            keys(&first),
            vec![
                ChunkKey::new(0, 0),
                ChunkKey::new(0, 1),
                ChunkKey::new(1, 0),
                ChunkKey::new(1, 1),
            ]
        );
        assert_eq!(app.world().resource::<LoadedChunkEntities>().len(), 4);

        // Tile (14, 10) is in chunk (3, 2), the far corner of the world.
        app.world_mut().resource_mut::<TerrainViewerWorldXz>().0 = Vec2::new(14.5, 10.5);
        app.update();

        let moved = spawned(&mut app);
        assert_eq!(
            keys(&moved),
            vec![
                ChunkKey::new(2, 1),
                ChunkKey::new(2, 2),
                ChunkKey::new(3, 1),
                ChunkKey::new(3, 2),
            ]
        );
        for (_, entity) in &first {
            assert!(app.world().get_entity(*entity).is_err());
        }

        // Nothing changed, nothing is respawned.
        app.update();
        assert_eq!(spawned(&mut app), moved);
    }

    #[test]
    fn edited_chunk_is_respawned() {
        let mut app = sync_app(Vec2::ZERO);
        app.update();
        let before = spawned(&mut app);

        recolor(&app, 5, 2, Color::srgb(1.0, 0.0, 0.0));
        app.update();
        let after = spawned(&mut app);

        let edited = ChunkKey::new(1, 0);
        let old: Vec<Entity> = before.iter().filter(|(k, _)| *k == edited).map(|(_, e)| *e).collect();
        let new: Vec<Entity> = after.iter().filter(|(k, _)| *k == edited).map(|(_, e)| *e).collect();
        assert_eq!(old.len(), 1);
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|e| !old.contains(e)));

        let untouched = |list: &[(ChunkKey, Entity)]| -> Vec<(ChunkKey, Entity)> {
            list.iter().copied().filter(|(k, _)| *k != edited).collect()
        };
        assert_eq!(untouched(&before), untouched(&after));
    }

    #[test]
    fn replaced_materials_are_released() {
        let mut app = sync_app(Vec2::ZERO);
        app.update();
        assert_eq!(app.world().resource::<TerrainMaterialHandles>().handles.len(), 1);

        for i in 0..5 {
            recolor(&app, 5, 2, Color::srgb(i as f32 * 0.2, 0.0, 0.0));
            app.update();
        }
        assert_eq!(app.world().resource::<TerrainMaterialHandles>().handles.len(), 2);

        // Moving away unloads the recolored chunk and its material.
        app.world_mut().resource_mut::<TerrainViewerWorldXz>().0 = Vec2::new(14.5, 10.5);
        app.update();
        assert_eq!(app.world().resource::<TerrainMaterialHandles>().handles.len(), 1);

        app.update();
        app.update();
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 1);
    }
}
