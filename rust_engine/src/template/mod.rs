//! BodyGen 模板
//!
//! 模板由若干选择器组成，每个选择器在几个取值区间中随机挑一个并采样。
//! NPC 通过 morphs.ini 绑定到一组模板列表，每个列表随机挑一个模板。

mod parser;
mod population;

pub use parser::{parse_morphs, parse_templates, AssignmentTarget, MorphAssignment};
pub use population::BodyGenPopulationIndex;

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::host::{Gender, NpcId};
use crate::strings::FixedStr;

/// 一个 Morph 名称的取值区间
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyGenRange {
    pub name: FixedStr,
    pub lower: f32,
    pub upper: f32,
}

impl BodyGenRange {
    pub fn new(name: FixedStr, lower: f32, upper: f32) -> Self {
        Self { name, lower, upper }
    }

    /// 固定值
    pub fn fixed(name: FixedStr, value: f32) -> Self {
        Self::new(name, value, value)
    }

    /// 在 `[min(lower, upper), max(lower, upper)]` 内均匀采样
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let low = self.lower.min(self.upper);
        let high = self.lower.max(self.upper);
        if low == high {
            low
        } else {
            rng.random_range(low..=high)
        }
    }
}

/// 在若干区间中均匀挑选一个
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodyGenSelector {
    pub ranges: Vec<BodyGenRange>,
}

impl BodyGenSelector {
    pub fn new(ranges: Vec<BodyGenRange>) -> Self {
        Self { ranges }
    }

    /// 采样并通过回调输出，返回输出的数量（0 或 1）
    pub fn evaluate<R: Rng + ?Sized>(&self, rng: &mut R, eval: &mut dyn FnMut(FixedStr, f32)) -> u32 {
        let range = match self.ranges.as_slice() {
            [] => return 0,
            [only] => only,
            ranges => match ranges.choose(rng) {
                Some(r) => r,
                None => return 0,
            },
        };
        eval(range.name, range.sample(rng));
        1
    }
}

/// 模板：每个选择器各输出一个值
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodyGenTemplate {
    pub selectors: Vec<BodyGenSelector>,
}

impl BodyGenTemplate {
    pub fn new(selectors: Vec<BodyGenSelector>) -> Self {
        Self { selectors }
    }

    pub fn evaluate<R: Rng + ?Sized>(&self, rng: &mut R, eval: &mut dyn FnMut(FixedStr, f32)) -> u32 {
        self.selectors.iter().map(|s| s.evaluate(rng, eval)).sum()
    }
}

/// 模板名 -> 模板，加载后不再修改
pub type BodyGenTemplateTable = HashMap<FixedStr, Arc<BodyGenTemplate>>;

/// 备选模板，均匀挑选一个
#[derive(Clone, Debug, Default)]
pub struct BodyTemplateList {
    pub templates: Vec<Arc<BodyGenTemplate>>,
}

impl BodyTemplateList {
    pub fn evaluate<R: Rng + ?Sized>(&self, rng: &mut R, eval: &mut dyn FnMut(FixedStr, f32)) -> u32 {
        match self.templates.choose(rng) {
            Some(template) => template.evaluate(rng, eval),
            None => 0,
        }
    }
}

/// 一个 NPC 的全部模板列表，每个列表独立求值
#[derive(Clone, Debug, Default)]
pub struct BodyGenDataTemplates {
    pub lists: Vec<BodyTemplateList>,
}

impl BodyGenDataTemplates {
    pub fn evaluate<R: Rng + ?Sized>(&self, rng: &mut R, eval: &mut dyn FnMut(FixedStr, f32)) -> u32 {
        self.lists.iter().map(|l| l.evaluate(rng, eval)).sum()
    }
}

/// 按性别分区的 NPC -> 模板绑定
#[derive(Clone, Debug, Default)]
pub struct BodyGenData {
    by_gender: [HashMap<NpcId, Arc<BodyGenDataTemplates>>; 2],
}

impl BodyGenData {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定模板，已有绑定被覆盖
    pub fn insert(&mut self, gender: Gender, npc: NpcId, templates: Arc<BodyGenDataTemplates>) {
        self.by_gender[gender.index()].insert(npc, templates);
    }

    pub fn get(&self, gender: Gender, npc: NpcId) -> Option<Arc<BodyGenDataTemplates>> {
        self.by_gender[gender.index()].get(&npc).cloned()
    }

    pub fn len(&self, gender: Gender) -> usize {
        self.by_gender[gender.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gender.iter().all(HashMap::is_empty)
    }

    pub fn clear(&mut self) {
        for map in &mut self.by_gender {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn name(s: &str) -> FixedStr {
        FixedStr::new(s)
    }

    #[test]
    fn test_range_sample_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        // 上下界反写也按区间处理
        let range = BodyGenRange::new(name("Breasts"), 0.9, 0.1);
        for _ in 0..1000 {
            let v = range.sample(&mut rng);
            assert!((0.1..=0.9).contains(&v));
        }
        assert_eq!(BodyGenRange::fixed(name("Breasts"), 0.5).sample(&mut rng), 0.5);
    }

    #[test]
    fn test_selector_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Vec::new();
        assert_eq!(BodyGenSelector::default().evaluate(&mut rng, &mut |n, v| out.push((n, v))), 0);
        assert!(out.is_empty());

        let single = BodyGenSelector::new(vec![BodyGenRange::fixed(name("Butt"), 0.25)]);
        assert_eq!(single.evaluate(&mut rng, &mut |n, v| out.push((n, v))), 1);
        assert_eq!(out, vec![(name("Butt"), 0.25)]);
    }

    #[test]
    fn test_two_range_selector_frequency() {
        let mut rng = StdRng::seed_from_u64(42);
        let selector = BodyGenSelector::new(vec![
            BodyGenRange::new(name("Breasts"), 0.0, 1.0),
            BodyGenRange::new(name("Butt"), 0.0, 1.0),
        ]);

        let samples = 20_000;
        let mut breasts = 0;
        for _ in 0..samples {
            selector.evaluate(&mut rng, &mut |n, _| {
                if n == name("Breasts") {
                    breasts += 1;
                }
            });
        }
        let ratio = breasts as f64 / samples as f64;
        assert!((ratio - 0.5).abs() < 0.03, "ratio = {}", ratio);
    }

    #[test]
    fn test_template_and_lists() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Arc::new(BodyGenTemplate::new(vec![
            BodyGenSelector::new(vec![BodyGenRange::fixed(name("Breasts"), 1.0)]),
            BodyGenSelector::new(vec![BodyGenRange::fixed(name("Waist"), 0.5)]),
        ]));
        let b = Arc::new(BodyGenTemplate::new(vec![BodyGenSelector::new(vec![BodyGenRange::fixed(
            name("Arms"),
            0.2,
        )])]));

        let mut out = Vec::new();
        assert_eq!(a.evaluate(&mut rng, &mut |n, v| out.push((n, v))), 2);

        let data = BodyGenDataTemplates {
            lists: vec![
                BodyTemplateList {
                    templates: vec![a.clone()],
                },
                BodyTemplateList { templates: vec![b] },
                BodyTemplateList::default(),
            ],
        };
        out.clear();
        assert_eq!(data.evaluate(&mut rng, &mut |n, v| out.push((n, v))), 3);
        assert!(out.contains(&(name("Arms"), 0.2)));
    }

    #[test]
    fn test_body_gen_data_partitions_by_gender() {
        let mut data = BodyGenData::new();
        assert!(data.is_empty());
        data.insert(Gender::Female, 7, Arc::new(BodyGenDataTemplates::default()));
        assert!(data.get(Gender::Female, 7).is_some());
        assert!(data.get(Gender::Male, 7).is_none());
        assert_eq!(data.len(Gender::Female), 1);
        data.clear();
        assert!(data.is_empty());
    }
}
