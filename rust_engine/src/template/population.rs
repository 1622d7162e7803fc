//! BodyGen 人口索引
//!
//! 加载 morphs.ini 时多行常用相同的筛选条件，结果按条件缓存。

use std::collections::HashMap;
use std::sync::Arc;

use crate::host::{Gender, NpcId, NpcInfo};
use crate::strings::FixedStr;

type FilterKey = (Gender, Option<FixedStr>, Option<FixedStr>);

/// 基于一次 NPC 快照的筛选索引
pub struct BodyGenPopulationIndex {
    population: Vec<NpcInfo>,
    genders: HashMap<NpcId, Gender>,
    filtered: HashMap<FilterKey, Arc<Vec<NpcId>>>,
}

impl BodyGenPopulationIndex {
    pub fn new(population: Vec<NpcInfo>) -> Self {
        let genders = population.iter().map(|npc| (npc.id, npc.gender)).collect();
        Self {
            population,
            genders,
            filtered: HashMap::new(),
        }
    }

    /// 满足条件的 NPC，None 表示不限
    pub fn filtered(&mut self, gender: Gender, race: Option<FixedStr>, mod_name: Option<FixedStr>) -> Arc<Vec<NpcId>> {
        let population = &self.population;
        self.filtered
            .entry((gender, race, mod_name))
            .or_insert_with(|| {
                Arc::new(
                    population
                        .iter()
                        .filter(|npc| npc.gender == gender)
                        .filter(|npc| race.map_or(true, |r| npc.race == r))
                        .filter(|npc| mod_name.map_or(true, |m| npc.mod_name == m))
                        .map(|npc| npc.id)
                        .collect(),
                )
            })
            .clone()
    }

    pub fn gender_of(&self, npc: NpcId) -> Option<Gender> {
        self.genders.get(&npc).copied()
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    /// 已缓存的筛选条件数量
    pub fn memoized(&self) -> usize {
        self.filtered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc(id: NpcId, mod_name: &str, gender: Gender, race: &str) -> NpcInfo {
        NpcInfo {
            id,
            mod_name: FixedStr::new(mod_name),
            gender,
            race: FixedStr::new(race),
        }
    }

    fn index() -> BodyGenPopulationIndex {
        BodyGenPopulationIndex::new(vec![
            npc(1, "Skyrim.esm", Gender::Female, "NordRace"),
            npc(2, "Skyrim.esm", Gender::Female, "ImperialRace"),
            npc(3, "Skyrim.esm", Gender::Male, "NordRace"),
            npc(4, "Dawnguard.esm", Gender::Female, "NordRace"),
        ])
    }

    #[test]
    fn test_filters() {
        let mut index = index();
        assert_eq!(*index.filtered(Gender::Female, None, None), vec![1, 2, 4]);
        assert_eq!(
            *index.filtered(Gender::Female, Some(FixedStr::new("nordrace")), None),
            vec![1, 4]
        );
        assert_eq!(
            *index.filtered(
                Gender::Female,
                Some(FixedStr::new("NordRace")),
                Some(FixedStr::new("Dawnguard.esm"))
            ),
            vec![4]
        );
        assert!(index.filtered(Gender::Male, Some(FixedStr::new("ImperialRace")), None).is_empty());
        assert_eq!(index.gender_of(3), Some(Gender::Male));
        assert_eq!(index.gender_of(99), None);
    }

    #[test]
    fn test_results_are_memoized() {
        let mut index = index();
        let first = index.filtered(Gender::Female, None, None);
        let second = index.filtered(Gender::Female, None, None);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(index.memoized(), 1);
    }
}
