//! JNI 绑定层 - 与 Java 代码交互

mod native_func;
mod registry_host;

pub use native_func::*;
pub use registry_host::{ActorEntry, RegistryHost};

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::get_config;
use crate::interface::BodyMorphInterface;
use crate::tri::FsTriSource;

/// Java 侧使用的接口类型
pub type NativeInterface = BodyMorphInterface<RegistryHost>;

/// 全局接口实例，Initialize 之前为 None
pub static INTERFACE: Lazy<RwLock<Option<Arc<NativeInterface>>>> = Lazy::new(|| RwLock::new(None));

/// 创建并替换全局接口，TRI 文件相对 `data_root` 读取
pub fn initialize(data_root: impl Into<PathBuf>) -> Arc<NativeInterface> {
    let data_root = data_root.into();
    let mut config = get_config();
    if config.data_directory.is_relative() {
        config.data_directory = data_root.join(&config.data_directory);
    }

    let interface = Arc::new(BodyMorphInterface::with_config(
        Arc::new(RegistryHost::new()),
        Arc::new(FsTriSource::new(data_root)),
        &config,
    ));
    *INTERFACE.write() = Some(interface.clone());
    log::info!("BodyMorph interface initialized (v{})", interface.get_version());
    interface
}

/// 获取全局接口
pub fn interface() -> Option<Arc<NativeInterface>> {
    INTERFACE.read().clone()
}

/// 在全局接口上执行，未初始化时返回 `default`
fn with_interface<R>(default: R, f: impl FnOnce(&NativeInterface) -> R) -> R {
    match interface() {
        Some(iface) => f(&iface),
        None => {
            log::warn!("BodyMorph interface used before Initialize");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ActorKey, Gender, NpcInfo};
    use crate::strings::FixedStr;

    #[test]
    fn test_global_interface_bodygen_and_actor_listing() {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("templates.ini");
        let morphs = root.path().join("morphs.ini");
        std::fs::write(&templates, "Slim=Waist@0.5\n").unwrap();
        std::fs::write(&morphs, "All|Female=Slim\n").unwrap();

        let iface = initialize(root.path());
        let npc = NpcInfo {
            id: 0x0001_3BBF,
            mod_name: FixedStr::new("Skyrim.esm"),
            gender: Gender::Female,
            race: FixedStr::new("NordRace"),
        };
        let actor = ActorKey::from_parts(5, npc.id);
        iface.host().register_npc(npc.clone());
        iface.host().register_actor(actor, "");
        assert!(iface.host().set_actor_npc(actor, npc.id));

        let read = with_interface(-1, |i| i.read_body_morph_templates(&templates).map_or(-1, |n| n as i32));
        assert_eq!(read, 1);
        let read = with_interface(-1, |i| i.read_body_morphs(&morphs).map_or(-1, |n| n as i32));
        assert_eq!(read, 1);
        assert_eq!(with_interface(0, |i| i.evaluate_body_morphs(actor)), 1);

        let mut actors = Vec::new();
        with_interface((), |i| i.visit_actors(|a| actors.push(a)));
        assert_eq!(actors, vec![actor]);

        // 角色没有 TRI 路径，擦除任务照常执行但不改动网格
        with_interface((), |i| i.erase_body_morphs(actor, true));
        assert_eq!(iface.pending_task_count(), 1);
        assert_eq!(iface.run_pending_tasks(), 1);
    }
}
