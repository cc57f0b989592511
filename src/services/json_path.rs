//! JSON 路径提取 - 业务能力层
//!
//! 按点分路径从任意 JSON 树中提取字符串（文档 ID、文件名）。

use serde_json::Value as JsonValue;

/// 按 `a.b.c` 形式的路径提取字符串
///
/// - 对象中存在当前键：用剩余路径进入该值
/// - 对象中不存在当前键：用**完整的**当前路径搜索对象的每一个值
/// - 数组：用当前路径进入每个元素
/// - 路径耗尽：字符串贡献自身，字符串数组贡献所有字符串，其它忽略
///
/// 结果按遇到顺序拼接，不去重。
pub fn extract_json_values(data: &JsonValue, path: &str) -> Vec<String> {
    let keys: Vec<&str> = path.split('.').collect();
    let mut results = Vec::new();
    extract_recursive(data, &keys, &mut results);
    results
}

fn extract_recursive(data: &JsonValue, keys: &[&str], results: &mut Vec<String>) {
    let Some((key, remaining)) = keys.split_first() else {
        match data {
            JsonValue::String(s) => results.push(s.clone()),
            JsonValue::Array(items) => {
                results.extend(items.iter().filter_map(|i| i.as_str().map(str::to_string)));
            }
            _ => {}
        }
        return;
    };

    match data {
        JsonValue::Object(map) => match map.get(*key) {
            Some(value) => extract_recursive(value, remaining, results),
            None => {
                for value in map.values() {
                    extract_recursive(value, keys, results);
                }
            }
        },
        JsonValue::Array(items) => {
            for item in items {
                extract_recursive(item, keys, results);
            }
        }
        _ => {}
    }
}
