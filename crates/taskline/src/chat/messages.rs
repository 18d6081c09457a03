/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! LINE message payload builders.
//!
//! Flex bubbles for the task list and task detail, plus plain-text helpers.
//! Payloads are built as `serde_json` values; the Messaging API consumes them
//! verbatim.

use crate::models::task::{PlanTag, Task};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Tasks shown in one list bubble; the rest is summarized in a footer line.
const LIST_LIMIT: usize = 20;

/// A plain text message object.
pub fn text_message(text: impl Into<String>) -> Value {
    json!({ "type": "text", "text": text.into() })
}

fn format_yy_mm_dd(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(dt) => dt
            .with_timezone(&crate::entitlement::TOKYO)
            .format("%y/%m/%d")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Builds the task-list Flex message for a user's tasks.
pub fn tasks_flex(tasks: &[Task]) -> Value {
    let mut contents = vec![
        json!({ "type": "text", "text": format!("{} 件", tasks.len()), "size": "sm", "color": "#666666" }),
        json!({ "type": "separator", "margin": "md" }),
        json!({
            "type": "box",
            "layout": "horizontal",
            "spacing": "sm",
            "margin": "sm",
            "contents": [
                { "type": "text", "text": "タスク名", "size": "xxs", "weight": "bold", "flex": 6, "align": "center", "color": "#111111" },
                { "type": "text", "text": "実行時間", "size": "xxs", "weight": "bold", "flex": 3, "align": "center", "color": "#111111" },
                { "type": "text", "text": "期限",     "size": "xxs", "weight": "bold", "flex": 3, "align": "center", "color": "#111111" },
                { "type": "text", "text": "プラン",   "size": "xxs", "weight": "bold", "flex": 2, "align": "center", "color": "#111111" },
            ],
        }),
        json!({ "type": "separator", "margin": "sm" }),
    ];

    if tasks.is_empty() {
        contents.push(json!({
            "type": "text", "text": "タスクがありません。",
            "size": "sm", "color": "#666666", "margin": "md", "wrap": true
        }));
    } else {
        for task in tasks.iter().take(LIST_LIMIT) {
            let is_gray = !task.enabled;
            let row_color = if is_gray { "#AAAAAA" } else { "#222222" };
            let plan_color = if is_gray {
                "#AAAAAA"
            } else if PlanTag::parse(&task.plan_tag) == Some(PlanTag::Paid) {
                "#B42318"
            } else {
                "#1A7F37"
            };
            let status_suffix = if is_gray { "（disabled）" } else { "" };

            contents.push(json!({
                "type": "box",
                "layout": "horizontal",
                "spacing": "sm",
                "margin": "sm",
                "contents": [
                    { "type": "text", "text": format!("{}{}", task.name, status_suffix), "size": "xxs", "wrap": true, "flex": 6, "color": row_color },
                    { "type": "text", "text": task.schedule_value, "size": "xxs", "flex": 3, "align": "center", "color": row_color },
                    { "type": "text", "text": format_yy_mm_dd(task.expires_at), "size": "xxs", "flex": 3, "align": "center", "color": row_color },
                    { "type": "text", "text": task.plan_tag, "size": "xxs", "flex": 2, "align": "center", "color": plan_color },
                ],
            }));
        }

        if tasks.len() > LIST_LIMIT {
            contents.push(json!({ "type": "separator", "margin": "md" }));
            contents.push(json!({
                "type": "text",
                "text": format!("※ 表示は先頭{}件まで（全 {} 件）", LIST_LIMIT, tasks.len()),
                "size": "xs", "color": "#666666", "wrap": true, "margin": "sm"
            }));
        }
    }

    json!({
        "type": "flex",
        "altText": format!("実行中のタスク（{}件）", tasks.len()),
        "contents": {
            "type": "bubble",
            "styles": { "body": { "backgroundColor": "#FFFFFF" } },
            "body": { "type": "box", "layout": "vertical", "spacing": "sm", "contents": contents },
        },
    })
}

/// Builds the detail Flex message for a single task.
pub fn task_detail_flex(task: &Task) -> Value {
    fn row(label: &str, value: String) -> Value {
        json!({
            "type": "box",
            "layout": "horizontal",
            "spacing": "sm",
            "margin": "sm",
            "contents": [
                { "type": "text", "text": label, "size": "xs", "flex": 3, "color": "#666666" },
                { "type": "text", "text": value, "size": "xs", "flex": 7, "wrap": true, "color": "#222222" },
            ],
        })
    }

    let status = if task.enabled { "有効" } else { "無効" };
    let contents = vec![
        json!({ "type": "text", "text": task.name, "size": "md", "weight": "bold", "wrap": true }),
        json!({ "type": "separator", "margin": "md" }),
        row("状態", status.to_string()),
        row("実行時間", task.schedule_value.clone()),
        row("実行PC", task.pc_name.clone()),
        row("プラン", task.plan_tag.clone()),
        row("期限", format_yy_mm_dd(task.expires_at)),
        row(
            "支払日",
            task.payment_date
                .map(|d| d.format("%y/%m/%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];

    json!({
        "type": "flex",
        "altText": format!("タスク詳細：{}", task.name),
        "contents": {
            "type": "bubble",
            "body": { "type": "box", "layout": "vertical", "spacing": "sm", "contents": contents },
        },
    })
}
