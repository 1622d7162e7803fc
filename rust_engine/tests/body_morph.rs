//! 端到端测试：文件 -> 缓存 -> 数值 -> 网格

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use bodymorph_engine::delta::{VertexDelta, VertexLayout};
use bodymorph_engine::model::CpuGeometryBuffer;
use bodymorph_engine::tri::{parse_tri, TriBuilder};
use bodymorph_engine::{
    ActorKey, BodyMorphInterface, FixedStr, FsTriSource, Gender, MemoryTriSource, MeshNode, MorphCache, MorphConfig,
    MorphHost, NpcInfo, RuntimeVertex, TriShape,
};
use glam::{Vec2, Vec3};
use parking_lot::RwLock;

#[derive(Default)]
struct Host {
    actors: RwLock<HashMap<ActorKey, (String, Arc<MeshNode>, Option<NpcInfo>)>>,
    population: Vec<NpcInfo>,
}

impl MorphHost for Host {
    fn is_actor_valid(&self, actor: ActorKey) -> bool {
        self.actors.read().contains_key(&actor)
    }

    fn actor_tri_path(&self, actor: ActorKey) -> Option<String> {
        self.actors.read().get(&actor).map(|a| a.0.clone())
    }

    fn root_node(&self, actor: ActorKey) -> Option<Arc<MeshNode>> {
        self.actors.read().get(&actor).map(|a| a.1.clone())
    }

    fn actor_npc(&self, actor: ActorKey) -> Option<NpcInfo> {
        self.actors.read().get(&actor).and_then(|a| a.2.clone())
    }

    fn npc_population(&self) -> Vec<NpcInfo> {
        self.population.clone()
    }
}

fn bust_tri() -> Vec<u8> {
    TriBuilder::new()
        .position_morph(
            "Torso",
            "Bust",
            &[VertexDelta {
                index: 3,
                delta: Vec3::new(0.0, 0.0, 0.5),
            }],
        )
        .build()
        .unwrap()
}

fn torso_vertices() -> Vec<RuntimeVertex> {
    (0..6)
        .map(|i| RuntimeVertex {
            position: Vec3::new(i as f32, 0.0, 0.0),
            normal: Vec3::Y,
            uv: Vec2::new(0.5, 0.5),
        })
        .collect()
}

fn seeded_config() -> MorphConfig {
    MorphConfig {
        rng_seed: Some(1),
        ..MorphConfig::default()
    }
}

#[test]
fn bust_morph_offsets_vertex_from_disk() {
    let data = tempfile::tempdir().unwrap();
    let dir = data.path().join("meshes").join("actors");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("f.tri"), bust_tri()).unwrap();

    let actor = ActorKey::from_parts(1, 0x14);
    let root = Arc::new(MeshNode::new(vec![TriShape::from_vertices(
        FixedStr::new("Torso"),
        torso_vertices(),
    )]));
    let host = Host::default();
    host.actors
        .write()
        .insert(actor, ("Actors/F.tri".to_string(), root.clone(), None));

    let iface = BodyMorphInterface::with_config(
        Arc::new(host),
        Arc::new(FsTriSource::new(data.path())),
        &seeded_config(),
    );
    iface.set_morph(actor, "Bust", "user", 0.8);
    iface.apply_body_morphs(actor, true);
    assert_eq!(iface.run_pending_tasks(), 1);

    let torso = root.find_shape(FixedStr::new("Torso")).unwrap();
    let positions = torso.lock().positions().unwrap();
    let offset = positions[3] - Vec3::new(3.0, 0.0, 0.0);
    assert!((offset - Vec3::new(0.0, 0.0, 0.4)).length() < 1e-3, "offset = {:?}", offset);
    assert_eq!(positions[2], Vec3::new(2.0, 0.0, 0.0));
}

#[test]
fn described_buffer_shape_is_morphed_in_place() {
    let layout = VertexLayout::compressed();
    let mut buffer = CpuGeometryBuffer::zeroed(layout, 4);
    for i in 0..4 {
        layout.write_position(buffer.data_mut(), i, Vec3::new(i as f32, 0.0, 0.0));
    }
    let shape = TriShape::from_buffer(FixedStr::new("Torso"), Box::new(buffer)).unwrap();
    let root = MeshNode::new(vec![shape]);

    let actor = ActorKey::from_parts(2, 0x14);
    let host = Host::default();
    host.actors
        .write()
        .insert(actor, ("f.tri".to_string(), Arc::new(MeshNode::default()), None));
    let source = Arc::new(MemoryTriSource::new());
    source.insert("f.tri", bust_tri());

    let iface = BodyMorphInterface::with_config(Arc::new(host), source, &seeded_config());
    iface.set_morph(actor, "Bust", "user", 1.0);
    assert_eq!(iface.apply_vertex_diff(actor, &root, false), 1);

    let z = root.find_shape(FixedStr::new("Torso")).unwrap().lock().positions().unwrap()[3].z;
    // f16 存储，误差放宽
    assert!((z - 0.5).abs() < 1e-2);

    assert_eq!(iface.apply_vertex_diff(actor, &root, true), 1);
    let z = root.find_shape(FixedStr::new("Torso")).unwrap().lock().positions().unwrap()[3].z;
    assert_eq!(z, 0.0);
}

#[test]
fn cache_limit_of_first_file_keeps_second() {
    let source = MemoryTriSource::new();
    let a = bust_tri();
    let b = TriBuilder::new()
        .position_morph(
            "Torso",
            "Hips",
            &[VertexDelta {
                index: 1,
                delta: Vec3::new(0.5, 0.0, 0.0),
            }],
        )
        .build()
        .unwrap();
    let limit = parse_tri(&a).unwrap().memory_usage();
    source.insert("a.tri", a);
    source.insert("b.tri", b);

    let cache = MorphCache::new(limit);
    cache.cache_file("a.tri", &source).unwrap();
    cache.cache_file("b.tri", &source).unwrap();
    assert!(!cache.is_cached("a.tri"));
    assert!(cache.is_cached("b.tri"));
    assert!(cache.total_memory() <= limit);
}

#[test]
fn load_mods_then_evaluate_and_persist() {
    let data = tempfile::tempdir().unwrap();
    let mod_dir = data.path().join("CurvyMod");
    fs::create_dir_all(&mod_dir).unwrap();
    fs::write(
        mod_dir.join("templates.ini"),
        "; body presets\nCurvy=Breasts@0.2:0.6, Butt@0.3|Hips@0.3\n",
    )
    .unwrap();
    fs::write(mod_dir.join("morphs.ini"), "All|Female|NordRace=Curvy\n").unwrap();

    let lydia = NpcInfo {
        id: 0x000A_2C94,
        mod_name: FixedStr::new("Skyrim.esm"),
        gender: Gender::Female,
        race: FixedStr::new("NordRace"),
    };
    let actor = ActorKey::from_parts(7, lydia.id);
    let host = Host {
        population: vec![lydia.clone()],
        ..Host::default()
    };
    host.actors
        .write()
        .insert(actor, (String::new(), Arc::new(MeshNode::default()), Some(lydia)));

    let config = MorphConfig {
        data_directory: data.path().to_path_buf(),
        ..seeded_config()
    };
    let iface = BodyMorphInterface::with_config(Arc::new(host), Arc::new(MemoryTriSource::new()), &config);
    let report = iface.load_mods();
    assert_eq!((report.mods, report.templates, report.assignments), (1, 1, 1));

    assert_eq!(iface.evaluate_body_morphs(actor), 2);
    let breasts = iface.get_morph(actor, "Breasts", "BodyGen");
    assert!((0.2..=0.6).contains(&breasts));
    let other = iface.get_body_morphs(actor, "Butt") + iface.get_body_morphs(actor, "Hips");
    assert!((other - 0.3).abs() < 1e-6);

    let mut saved = Vec::new();
    iface.save_bundle(&mut saved).unwrap();
    let expected = iface.store().snapshot_all();
    iface.revert();
    assert!(!iface.has_morphs(actor));

    let report = iface.load_bundle(&mut Cursor::new(saved)).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(iface.store().snapshot_all(), expected);
}
