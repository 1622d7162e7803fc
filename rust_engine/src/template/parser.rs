//! templates.ini 与 morphs.ini 解析
//!
//! templates.ini：`模板名=名称@下界:上界|名称@值, 名称`
//! - 逗号分隔选择器，`|` 分隔同一选择器的备选区间
//! - 只写名称取固定值 1.0，`@值` 取固定值
//!
//! morphs.ini：`插件|性别|种族=模板1|模板2, 模板3`
//! - 逗号分隔模板列表，`|` 分隔同一列表中的备选模板
//! - 插件为 `All` 表示任意插件，种族可省略或写 `All`
//! - `插件|0x00ABCD=...` 指定单个 NPC（插件内局部 ID）
//!
//! `#` 与 `;` 开始注释。无法解析的行记录警告后跳过。

use crate::host::Gender;
use crate::strings::FixedStr;
use crate::{MorphError, Result};

use super::{BodyGenRange, BodyGenSelector, BodyGenTemplate};

/// morphs.ini 中一行的目标
#[derive(Clone, Debug, PartialEq)]
pub enum AssignmentTarget {
    /// 按人口条件筛选，None 表示不限
    Population {
        mod_name: Option<FixedStr>,
        gender: Gender,
        race: Option<FixedStr>,
    },
    /// 单个 NPC
    Npc { mod_name: String, local_id: u32 },
}

/// morphs.ini 中的一行
#[derive(Clone, Debug, PartialEq)]
pub struct MorphAssignment {
    pub target: AssignmentTarget,
    /// 每个列表中的备选模板名
    pub lists: Vec<Vec<FixedStr>>,
}

fn strip_comment(line: &str) -> &str {
    let end = line.find(['#', ';']).unwrap_or(line.len());
    line[..end].trim()
}

fn split_assignment(line: &str) -> Result<(&str, &str)> {
    let (lhs, rhs) = line
        .split_once('=')
        .ok_or_else(|| MorphError::TemplateParse(format!("Missing '=' in \"{}\"", line)))?;
    Ok((lhs.trim(), rhs.trim()))
}

fn parse_value(s: &str) -> Result<f32> {
    s.trim()
        .parse::<f32>()
        .map_err(|e| MorphError::TemplateParse(format!("Invalid value \"{}\": {}", s.trim(), e)))
}

fn parse_range(s: &str) -> Result<BodyGenRange> {
    let (name, values) = match s.split_once('@') {
        Some((name, values)) => (name.trim(), Some(values)),
        None => (s.trim(), None),
    };
    if name.is_empty() {
        return Err(MorphError::TemplateParse(format!("Missing morph name in \"{}\"", s)));
    }
    let name = FixedStr::new(name);

    match values {
        None => Ok(BodyGenRange::fixed(name, 1.0)),
        Some(values) => match values.split_once(':') {
            Some((lower, upper)) => Ok(BodyGenRange::new(name, parse_value(lower)?, parse_value(upper)?)),
            None => Ok(BodyGenRange::fixed(name, parse_value(values)?)),
        },
    }
}

fn parse_template_line(line: &str) -> Result<(FixedStr, BodyGenTemplate)> {
    let (name, body) = split_assignment(line)?;
    if name.is_empty() {
        return Err(MorphError::TemplateParse(format!("Missing template name in \"{}\"", line)));
    }

    let mut selectors = Vec::new();
    for part in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let ranges = part.split('|').map(parse_range).collect::<Result<Vec<_>>>()?;
        selectors.push(BodyGenSelector::new(ranges));
    }
    Ok((FixedStr::new(name), BodyGenTemplate::new(selectors)))
}

/// 解析 templates.ini，返回 (模板名, 模板)；同名模板以后出现的为准
pub fn parse_templates(text: &str) -> Vec<(FixedStr, BodyGenTemplate)> {
    let mut templates = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        match parse_template_line(line) {
            Ok(template) => templates.push(template),
            Err(e) => log::warn!("Skipping template line {}: {}", number + 1, e),
        }
    }
    templates
}

fn parse_wildcard(s: &str) -> Option<FixedStr> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(FixedStr::new(s))
    }
}

fn parse_form_id(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u32::from_str_radix(hex, 16).ok()
}

fn parse_target(s: &str) -> Result<AssignmentTarget> {
    let fields: Vec<&str> = s.split('|').map(str::trim).collect();
    match fields.as_slice() {
        [mod_name, second, rest @ ..] if rest.len() <= 1 => {
            if let Some(gender) = Gender::parse(second) {
                return Ok(AssignmentTarget::Population {
                    mod_name: parse_wildcard(mod_name),
                    gender,
                    race: rest.first().and_then(|r| parse_wildcard(r)),
                });
            }
            match (rest.is_empty(), parse_form_id(second)) {
                (true, Some(local_id)) if !mod_name.eq_ignore_ascii_case("all") => Ok(AssignmentTarget::Npc {
                    mod_name: mod_name.to_string(),
                    local_id,
                }),
                _ => Err(MorphError::TemplateParse(format!("Invalid target \"{}\"", s))),
            }
        }
        _ => Err(MorphError::TemplateParse(format!("Invalid target \"{}\"", s))),
    }
}

fn parse_morph_line(line: &str) -> Result<MorphAssignment> {
    let (target, body) = split_assignment(line)?;
    let target = parse_target(target)?;

    let lists: Vec<Vec<FixedStr>> = body
        .split(',')
        .map(|list| {
            list.split('|')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(FixedStr::new)
                .collect::<Vec<_>>()
        })
        .filter(|list| !list.is_empty())
        .collect();
    if lists.is_empty() {
        return Err(MorphError::TemplateParse(format!("No templates in \"{}\"", line)));
    }
    Ok(MorphAssignment { target, lists })
}

/// 解析 morphs.ini
pub fn parse_morphs(text: &str) -> Vec<MorphAssignment> {
    let mut assignments = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        match parse_morph_line(line) {
            Ok(assignment) => assignments.push(assignment),
            Err(e) => log::warn!("Skipping morph line {}: {}", number + 1, e),
        }
    }
    assignments
}
