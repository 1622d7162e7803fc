//! JNI 原生函数实现
//!
//! 对应 Java 侧 NativeMorph 类，使用标准 jni 0.21 API。
//! 角色用 jlong 传递（即 [`ActorKey`] 的原始值）。

use jni::objects::{JByteArray, JByteBuffer, JClass, JObject, JString};
use jni::sys::{jboolean, jbyteArray, jfloat, jint, jlong, jlongArray, jobjectArray};
use jni::JNIEnv;
use std::ptr;

use crate::delta::VertexLayout;
use crate::host::{ActorKey, Gender, MorphHost, NpcInfo};
use crate::model::{CpuGeometryBuffer, TriShape};
use crate::strings::FixedStr;

use super::{initialize, with_interface};

// ============================================================================
// 辅助函数
// ============================================================================

fn java_string(env: &mut JNIEnv, s: &JString) -> Option<String> {
    env.get_string(s).ok().map(Into::into)
}

fn to_jboolean(v: bool) -> jboolean {
    if v {
        1u8
    } else {
        0u8
    }
}

fn actor_key(actor: jlong) -> ActorKey {
    ActorKey(actor as u64)
}

fn string_array(env: &mut JNIEnv, items: &[String]) -> jobjectArray {
    let array = match env.new_object_array(items.len() as jint, "java/lang/String", JObject::null()) {
        Ok(a) => a,
        Err(_) => return ptr::null_mut(),
    };
    for (i, item) in items.iter().enumerate() {
        let Ok(s) = env.new_string(item) else {
            return ptr::null_mut();
        };
        if env.set_object_array_element(&array, i as jint, s).is_err() {
            return ptr::null_mut();
        }
    }
    array.into_raw()
}

/// 直接缓冲区的地址与容量
fn direct_buffer(env: &mut JNIEnv, buffer: &JByteBuffer) -> Option<(*mut u8, usize)> {
    let addr = env.get_direct_buffer_address(buffer).ok()?;
    let capacity = env.get_direct_buffer_capacity(buffer).ok()?;
    (!addr.is_null()).then_some((addr, capacity))
}

// ============================================================================
// 基础函数
// ============================================================================

/// 获取接口版本
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetVersion(_env: JNIEnv, _class: JClass) -> jint {
    crate::interface::PLUGIN_VERSION as jint
}

/// 初始化接口，TRI 文件相对 dataRoot 读取
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_Initialize(
    mut env: JNIEnv,
    _class: JClass,
    data_root: JString,
) -> jboolean {
    let Some(root) = java_string(&mut env, &data_root) else {
        return 0;
    };
    initialize(root);
    1
}

// ============================================================================
// 角色与网格注册
// ============================================================================

/// 注册角色及其身体 TRI 路径
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_RegisterActor(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    tri_path: JString,
) {
    let path = java_string(&mut env, &tri_path).unwrap_or_default();
    with_interface((), |iface| iface.host().register_actor(actor_key(actor), &path));
}

/// 注销角色，deleted 为 true 时同时删除其 Morph 数据
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_UnregisterActor(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
    deleted: jboolean,
) {
    with_interface((), |iface| {
        iface.host().unregister_actor(actor_key(actor));
        if deleted != 0 {
            iface.on_actor_deleted(actor_key(actor));
        }
    });
}

/// 注册 NPC
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_RegisterNpc(
    mut env: JNIEnv,
    _class: JClass,
    npc: jint,
    mod_name: JString,
    female: jboolean,
    race: JString,
) {
    let (Some(mod_name), Some(race)) = (java_string(&mut env, &mod_name), java_string(&mut env, &race)) else {
        return;
    };
    let info = NpcInfo {
        id: npc as u32,
        mod_name: FixedStr::new(&mod_name),
        gender: if female != 0 { Gender::Female } else { Gender::Male },
        race: FixedStr::new(&race),
    };
    with_interface((), |iface| iface.host().register_npc(info));
}

/// 绑定角色对应的 NPC
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_SetActorNpc(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
    npc: jint,
) -> jboolean {
    with_interface(0, |iface| to_jboolean(iface.host().set_actor_npc(actor_key(actor), npc as u32)))
}

/// 注册形状，从直接缓冲区复制顶点数据作为基准
///
/// compressed 为 true 时布局为 f16 位置 + f16 UV（12 字节），
/// 否则为 f32 位置 + f16 UV（16 字节）。
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_RegisterShape(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    buffer: JByteBuffer,
    vertex_count: jint,
    compressed: jboolean,
) -> jboolean {
    let Some(name) = java_string(&mut env, &name) else {
        return 0;
    };
    let layout = if compressed != 0 {
        VertexLayout::compressed()
    } else {
        VertexLayout::full_precision()
    };
    let count = vertex_count.max(0) as usize;
    let needed = layout.required_len(count);

    let Some((addr, capacity)) = direct_buffer(&mut env, &buffer) else {
        log::warn!("RegisterShape {}: not a direct buffer", name);
        return 0;
    };
    if capacity < needed {
        log::warn!("RegisterShape {}: buffer holds {} bytes, need {}", name, capacity, needed);
        return 0;
    }
    let data = unsafe { std::slice::from_raw_parts(addr as *const u8, needed) }.to_vec();

    let shape = CpuGeometryBuffer::new(layout, count, data)
        .and_then(|buffer| TriShape::from_buffer(FixedStr::new(&name), Box::new(buffer)));
    match shape {
        Ok(shape) => with_interface(0, |iface| to_jboolean(iface.host().register_shape(actor_key(actor), shape))),
        Err(e) => {
            log::error!("RegisterShape {} failed: {}", name, e);
            0
        }
    }
}

/// 把形状当前顶点位置（f32 x3）复制到直接缓冲区，返回复制的顶点数
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_CopyShapePositionsToBuffer(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    buffer: JByteBuffer,
) -> jint {
    let Some(name) = java_string(&mut env, &name) else {
        return 0;
    };
    let Some((dst, capacity)) = direct_buffer(&mut env, &buffer) else {
        return 0;
    };

    let positions = with_interface(None, |iface| {
        let root = iface.host().root_node(actor_key(actor))?;
        let shape = root.find_shape(FixedStr::lookup(&name)?)?;
        let positions = shape.lock().positions();
        positions.ok()
    });
    let Some(positions) = positions else {
        return 0;
    };

    let count = positions.len().min(capacity / 12);
    let flat: Vec<f32> = positions[..count].iter().flat_map(|p| p.to_array()).collect();
    unsafe {
        ptr::copy_nonoverlapping(flat.as_ptr() as *const u8, dst, flat.len() * 4);
    }
    count as jint
}

// ============================================================================
// Morph 数值
// ============================================================================

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_SetMorph(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    key: JString,
    value: jfloat,
) {
    let (Some(name), Some(key)) = (java_string(&mut env, &name), java_string(&mut env, &key)) else {
        return;
    };
    with_interface((), |iface| {
        iface.set_morph(actor_key(actor), &name, &key, value);
    });
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetMorph(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    key: JString,
) -> jfloat {
    let (Some(name), Some(key)) = (java_string(&mut env, &name), java_string(&mut env, &key)) else {
        return 0.0;
    };
    with_interface(0.0, |iface| iface.get_morph(actor_key(actor), &name, &key))
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ClearMorph(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    key: JString,
) {
    let (Some(name), Some(key)) = (java_string(&mut env, &name), java_string(&mut env, &key)) else {
        return;
    };
    with_interface((), |iface| iface.clear_morph(actor_key(actor), &name, &key));
}

/// 有效权重（全部键之和）
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetBodyMorphs(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
) -> jfloat {
    let Some(name) = java_string(&mut env, &name) else {
        return 0.0;
    };
    with_interface(0.0, |iface| iface.get_body_morphs(actor_key(actor), &name))
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ClearBodyMorphNames(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
) {
    let Some(name) = java_string(&mut env, &name) else {
        return;
    };
    with_interface((), |iface| iface.clear_body_morph_names(actor_key(actor), &name));
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ClearBodyMorphKeys(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    key: JString,
) -> jint {
    let Some(key) = java_string(&mut env, &key) else {
        return 0;
    };
    with_interface(0, |iface| iface.clear_body_morph_keys(actor_key(actor), &key) as jint)
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ClearMorphs(_env: JNIEnv, _class: JClass, actor: jlong) {
    with_interface((), |iface| iface.clear_morphs(actor_key(actor)));
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_HasMorphs(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
) -> jboolean {
    with_interface(0, |iface| to_jboolean(iface.has_morphs(actor_key(actor))))
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_HasBodyMorph(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
    key: JString,
) -> jboolean {
    let (Some(name), Some(key)) = (java_string(&mut env, &name), java_string(&mut env, &key)) else {
        return 0;
    };
    with_interface(0, |iface| to_jboolean(iface.has_body_morph(actor_key(actor), &name, &key)))
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_HasBodyMorphName(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
) -> jboolean {
    let Some(name) = java_string(&mut env, &name) else {
        return 0;
    };
    with_interface(0, |iface| to_jboolean(iface.has_body_morph_name(actor_key(actor), &name)))
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_HasBodyMorphKey(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    key: JString,
) -> jboolean {
    let Some(key) = java_string(&mut env, &key) else {
        return 0;
    };
    with_interface(0, |iface| to_jboolean(iface.has_body_morph_key(actor_key(actor), &key)))
}

/// 角色全部 Morph 名称
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetMorphNames(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
) -> jobjectArray {
    let mut names = with_interface(Vec::new(), |iface| {
        let mut names = Vec::new();
        iface.visit_morphs(actor_key(actor), |name, _| names.push(name.to_string()));
        names
    });
    names.sort();
    string_array(&mut env, &names)
}

/// 某个 Morph 名称下的全部键
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetMorphKeys(
    mut env: JNIEnv,
    _class: JClass,
    actor: jlong,
    name: JString,
) -> jobjectArray {
    let name = java_string(&mut env, &name).unwrap_or_default();
    let mut keys = with_interface(Vec::new(), |iface| {
        let mut keys = Vec::new();
        iface.visit_keys(actor_key(actor), &name, |key, _| keys.push(key.to_string()));
        keys
    });
    keys.sort();
    string_array(&mut env, &keys)
}

/// 所有有数据的角色
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_GetActors(mut env: JNIEnv, _class: JClass) -> jlongArray {
    let mut actors = with_interface(Vec::new(), |iface| {
        let mut actors = Vec::new();
        iface.visit_actors(|a| actors.push(a.0 as jlong));
        actors
    });
    actors.sort_unstable();

    let Ok(array) = env.new_long_array(actors.len() as jint) else {
        return ptr::null_mut();
    };
    if env.set_long_array_region(&array, 0, &actors).is_err() {
        return ptr::null_mut();
    }
    array.into_raw()
}

// ============================================================================
// 应用与任务
// ============================================================================

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ApplyBodyMorphs(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
    defer: jboolean,
) {
    with_interface((), |iface| iface.apply_body_morphs(actor_key(actor), defer != 0));
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_EraseBodyMorphs(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
    defer: jboolean,
) {
    with_interface((), |iface| iface.erase_body_morphs(actor_key(actor), defer != 0));
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_UpdateModelWeight(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
    immediate: jboolean,
) {
    with_interface((), |iface| iface.update_model_weight(actor_key(actor), immediate != 0));
}

/// 在渲染线程调用，执行排队的任务
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_RunPendingTasks(_env: JNIEnv, _class: JClass) -> jint {
    with_interface(0, |iface| iface.run_pending_tasks() as jint)
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_SetCacheLimit(_env: JNIEnv, _class: JClass, limit: jlong) {
    with_interface((), |iface| iface.set_cache_limit(limit.max(0) as usize));
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ShrinkCache(_env: JNIEnv, _class: JClass) -> jint {
    with_interface(0, |iface| iface.shrink_cache() as jint)
}

// ============================================================================
// BodyGen
// ============================================================================

/// 扫描 BodyGen 数据目录，返回绑定的 NPC 数量
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_LoadMods(_env: JNIEnv, _class: JClass) -> jint {
    with_interface(0, |iface| iface.load_mods().assignments as jint)
}

/// 读取单个 templates.ini，返回模板数量，失败返回 -1
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ReadBodyMorphTemplates(
    mut env: JNIEnv,
    _class: JClass,
    path: JString,
) -> jint {
    let Some(path) = java_string(&mut env, &path) else {
        return -1;
    };
    with_interface(-1, |iface| match iface.read_body_morph_templates(&path) {
        Ok(count) => count as jint,
        Err(e) => {
            log::warn!("Failed to read templates {}: {}", path, e);
            -1
        }
    })
}

/// 读取单个 morphs.ini，返回绑定数量，失败返回 -1
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_ReadBodyMorphs(
    mut env: JNIEnv,
    _class: JClass,
    path: JString,
) -> jint {
    let Some(path) = java_string(&mut env, &path) else {
        return -1;
    };
    with_interface(-1, |iface| match iface.read_body_morphs(&path) {
        Ok(count) => count as jint,
        Err(e) => {
            log::warn!("Failed to read morphs {}: {}", path, e);
            -1
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_EvaluateBodyMorphs(
    _env: JNIEnv,
    _class: JClass,
    actor: jlong,
) -> jint {
    with_interface(0, |iface| iface.evaluate_body_morphs(actor_key(actor)) as jint)
}

// ============================================================================
// 存档
// ============================================================================

/// 保存全部 Morph 数据（含字符串表）
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_SaveMorphs(env: JNIEnv, _class: JClass) -> jbyteArray {
    let bytes = with_interface(None, |iface| {
        let mut bytes = Vec::new();
        match iface.save_bundle(&mut bytes) {
            Ok(()) => Some(bytes),
            Err(e) => {
                log::error!("Failed to save morphs: {}", e);
                None
            }
        }
    });
    match bytes.map(|b| env.byte_array_from_slice(&b)) {
        Some(Ok(array)) => array.into_raw(),
        _ => ptr::null_mut(),
    }
}

/// 加载 SaveMorphs 的数据，返回加载的角色数量，失败返回 -1
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_LoadMorphs(
    env: JNIEnv,
    _class: JClass,
    data: JByteArray,
) -> jint {
    let Ok(bytes) = env.convert_byte_array(&data) else {
        return -1;
    };
    with_interface(-1, |iface| match iface.load_bundle(&mut std::io::Cursor::new(bytes)) {
        Ok(report) => report.loaded as jint,
        Err(e) => {
            log::error!("Failed to load morphs: {}", e);
            -1
        }
    })
}

/// 清空全部 Morph 数据
#[no_mangle]
pub extern "system" fn Java_com_shiroha_skinlayers3d_NativeMorph_Revert(_env: JNIEnv, _class: JClass) {
    with_interface((), |iface| iface.revert());
}
