//! BodyGen 数据加载与求值

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::host::{ActorKey, MorphHost};
use crate::strings::FixedStr;
use crate::template::{
    parse_morphs, parse_templates, AssignmentTarget, BodyGenDataTemplates, BodyGenPopulationIndex,
    BodyTemplateList, MorphAssignment,
};
use crate::Result;

use super::{BodyMorphInterface, TEMPLATE_MORPH_KEY};

const TEMPLATES_FILE: &str = "templates.ini";
const MORPHS_FILE: &str = "morphs.ini";

/// [`load_mods`](BodyMorphInterface::load_mods) 的统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyGenLoadReport {
    /// 扫描到的模组目录数量
    pub mods: usize,
    pub templates: usize,
    /// 绑定的 NPC 数量（同一 NPC 重复绑定会重复计数）
    pub assignments: usize,
}

impl<H: MorphHost> BodyMorphInterface<H> {
    /// 读取 templates.ini，返回读入的模板数量
    pub fn read_body_morph_templates(&self, path: impl AsRef<Path>) -> Result<usize> {
        let text = fs::read_to_string(path.as_ref())?;
        let templates = parse_templates(&text);
        let count = templates.len();
        self.templates.write(|table| {
            for (name, template) in templates {
                table.insert(name, Arc::new(template));
            }
        });
        log::info!("Loaded {} BodyGen templates from {}", count, path.as_ref().display());
        Ok(count)
    }

    /// 读取 morphs.ini，返回绑定的 NPC 数量
    pub fn read_body_morphs(&self, path: impl AsRef<Path>) -> Result<usize> {
        let mut index = BodyGenPopulationIndex::new(self.host.npc_population());
        self.read_body_morphs_with(path.as_ref(), &mut index)
    }

    fn read_body_morphs_with(&self, path: &Path, index: &mut BodyGenPopulationIndex) -> Result<usize> {
        let text = fs::read_to_string(path)?;
        let mut count = 0;
        for assignment in parse_morphs(&text) {
            count += self.assign(&assignment, index);
        }
        log::info!("Loaded {} BodyGen assignments from {}", count, path.display());
        Ok(count)
    }

    fn assign(&self, assignment: &MorphAssignment, index: &mut BodyGenPopulationIndex) -> usize {
        let Some(templates) = self.resolve_lists(&assignment.lists) else {
            return 0;
        };

        match &assignment.target {
            AssignmentTarget::Population { mod_name, gender, race } => {
                let npcs = index.filtered(*gender, *race, *mod_name);
                self.body_gen.write(|data| {
                    for npc in npcs.iter() {
                        data.insert(*gender, *npc, templates.clone());
                    }
                });
                npcs.len()
            }
            AssignmentTarget::Npc { mod_name, local_id } => {
                let npc = self.host.lookup_npc(mod_name, *local_id);
                match npc.and_then(|id| index.gender_of(id).map(|g| (id, g))) {
                    Some((id, gender)) => {
                        self.body_gen.write(|data| data.insert(gender, id, templates));
                        1
                    }
                    None => {
                        log::warn!("BodyGen target {}|{:#08X} not found", mod_name, local_id);
                        0
                    }
                }
            }
        }
    }

    /// 把模板名列表解析为模板，未知模板被跳过
    fn resolve_lists(&self, lists: &[Vec<FixedStr>]) -> Option<Arc<BodyGenDataTemplates>> {
        let resolved: Vec<BodyTemplateList> = self.templates.read(|table| {
            lists
                .iter()
                .map(|names| BodyTemplateList {
                    templates: names
                        .iter()
                        .filter_map(|name| {
                            let template = table.get(name).cloned();
                            if template.is_none() {
                                log::warn!("Unknown BodyGen template {}", name);
                            }
                            template
                        })
                        .collect(),
                })
                .filter(|list| !list.templates.is_empty())
                .collect()
        });
        (!resolved.is_empty()).then(|| Arc::new(BodyGenDataTemplates { lists: resolved }))
    }

    /// 扫描数据目录下的全部模组
    ///
    /// 先读入所有模组的 templates.ini，再读入所有 morphs.ini，
    /// 模组之间可以引用彼此的模板。重新加载前清空已有数据。
    pub fn load_mods(&self) -> BodyGenLoadReport {
        self.templates.write(|table| table.clear());
        self.body_gen.write(|data| data.clear());

        let mut report = BodyGenLoadReport::default();
        let mut mods: Vec<_> = match fs::read_dir(&self.data_directory) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(e) => {
                log::warn!("BodyGen directory {} unavailable: {}", self.data_directory.display(), e);
                return report;
            }
        };
        mods.sort();
        report.mods = mods.len();

        for dir in &mods {
            let path = dir.join(TEMPLATES_FILE);
            if path.is_file() {
                match self.read_body_morph_templates(&path) {
                    Ok(n) => report.templates += n,
                    Err(e) => log::warn!("Failed to read {}: {}", path.display(), e),
                }
            }
        }

        let mut index = BodyGenPopulationIndex::new(self.host.npc_population());
        for dir in &mods {
            let path = dir.join(MORPHS_FILE);
            if path.is_file() {
                match self.read_body_morphs_with(&path, &mut index) {
                    Ok(n) => report.assignments += n,
                    Err(e) => log::warn!("Failed to read {}: {}", path.display(), e),
                }
            }
        }

        log::info!(
            "BodyGen: {} mods, {} templates, {} assignments",
            report.mods,
            report.templates,
            report.assignments
        );
        report
    }

    pub fn template_count(&self) -> usize {
        self.templates.read(|table| table.len())
    }

    /// 按角色的 NPC 绑定随机生成数值，写入保留键，返回设置的 Morph 个数
    ///
    /// 之前由 BodyGen 写入的数值会先被清除；同一次求值中重复的名称累加。
    pub fn evaluate_body_morphs(&self, actor: ActorKey) -> u32 {
        let Some(npc) = self.host.actor_npc(actor) else {
            return 0;
        };
        let Some(templates) = self.body_gen.read(|data| data.get(npc.gender, npc.id)) else {
            return 0;
        };

        let mut values: HashMap<FixedStr, f32> = HashMap::new();
        let emitted = {
            let mut rng = self.rng.lock();
            templates.evaluate(&mut *rng, &mut |name, value| {
                *values.entry(name).or_insert(0.0) += value;
            })
        };
        let count = values.len() as u32;

        let key = FixedStr::new(TEMPLATE_MORPH_KEY);
        self.store.clear_body_morph_keys(actor, key);
        for (name, value) in values {
            self.store.set_morph(actor, name, key, value);
        }

        if self.debug_log {
            log::debug!("Evaluated {} BodyGen values into {} morphs for {:?}", emitted, count, actor);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{interface, npc, TestHost};
    use super::*;
    use crate::config::MorphConfig;
    use crate::host::Gender;
    use crate::model::MeshNode;
    use crate::tri::MemoryTriSource;

    fn write(dir: &Path, file: &str, text: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), text).unwrap();
    }

    fn host_with_actor(actor: ActorKey, npc_id: u32, gender: Gender) -> TestHost {
        let host = TestHost {
            population: vec![npc(1, Gender::Female), npc(2, Gender::Female), npc(3, Gender::Male)],
            plugin_ids: [(("dawnguard.esm".to_string(), 0xABCD), 3)].into_iter().collect(),
            ..TestHost::default()
        };
        host.actors.write().insert(
            actor,
            (String::new(), Arc::new(MeshNode::default()), Some(npc(npc_id, gender))),
        );
        host
    }

    #[test]
    fn test_read_templates_and_morphs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates.ini", "Fixed=Breasts@0.5, Waist@0.25|Waist@0.25\n");
        write(dir.path(), "morphs.ini", "All|Female=Fixed\nDawnguard.esm|0x00ABCD=Fixed\n");

        let actor = ActorKey::from_parts(1, 0x14);
        let (iface, _) = interface(host_with_actor(actor, 2, Gender::Female));
        assert_eq!(iface.read_body_morph_templates(dir.path().join("templates.ini")).unwrap(), 1);
        assert_eq!(iface.read_body_morphs(dir.path().join("morphs.ini")).unwrap(), 3);

        // 用户数值不受影响，旧的 BodyGen 数值被替换
        iface.set_morph(actor, "Breasts", "user", 0.1);
        iface.set_morph(actor, "Arms", "BodyGen", 1.0);
        assert_eq!(iface.evaluate_body_morphs(actor), 2);
        assert_eq!(iface.get_morph(actor, "Breasts", "BodyGen"), 0.5);
        assert_eq!(iface.get_morph(actor, "Waist", "BodyGen"), 0.25);
        assert_eq!(iface.get_morph(actor, "Breasts", "user"), 0.1);
        assert!(!iface.has_body_morph_name(actor, "Arms"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let (iface, _) = interface(TestHost::default());
        assert!(iface.read_body_morph_templates("/definitely/not/here.ini").is_err());
    }

    #[test]
    fn test_duplicate_names_sum_within_one_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates.ini", "A=Breasts@0.25\nB=Breasts@0.5\n");
        write(dir.path(), "morphs.ini", "All|Female=A, B\n");

        let actor = ActorKey::from_parts(1, 0x14);
        let (iface, _) = interface(host_with_actor(actor, 1, Gender::Female));
        iface.read_body_morph_templates(dir.path().join("templates.ini")).unwrap();
        iface.read_body_morphs(dir.path().join("morphs.ini")).unwrap();

        assert_eq!(iface.evaluate_body_morphs(actor), 1);
        assert_eq!(iface.get_morph(actor, "Breasts", "BodyGen"), 0.75);
    }

    #[test]
    fn test_load_mods_cross_mod_templates() {
        let root = tempfile::tempdir().unwrap();
        // morphs.ini 在 a 模组，引用 b 模组定义的模板
        write(&root.path().join("a_mod"), "morphs.ini", "Skyrim.esm|Male|NordRace=Bulky\n");
        write(&root.path().join("b_mod"), "templates.ini", "Bulky=Arms@1.0:1.0\n");
        fs::write(root.path().join("stray.txt"), "ignored").unwrap();

        let actor = ActorKey::from_parts(4, 0x30);
        let host = host_with_actor(actor, 3, Gender::Male);
        let config = MorphConfig {
            data_directory: root.path().to_path_buf(),
            rng_seed: Some(11),
            ..MorphConfig::default()
        };
        let iface = BodyMorphInterface::with_config(Arc::new(host), Arc::new(MemoryTriSource::new()), &config);

        let report = iface.load_mods();
        assert_eq!(
            report,
            BodyGenLoadReport {
                mods: 2,
                templates: 1,
                assignments: 1,
            }
        );
        assert_eq!(iface.evaluate_body_morphs(actor), 1);
        assert_eq!(iface.get_morph(actor, "Arms", "BodyGen"), 1.0);

        // 重新加载不会重复
        assert_eq!(iface.load_mods(), report);
        assert_eq!(iface.template_count(), 1);
    }

    #[test]
    fn test_actor_without_data() {
        let actor = ActorKey::from_parts(1, 0x14);
        let (iface, _) = interface(host_with_actor(actor, 3, Gender::Male));
        assert_eq!(iface.evaluate_body_morphs(actor), 0);
        assert_eq!(iface.evaluate_body_morphs(ActorKey::from_parts(2, 2)), 0);
    }
}
