//! Order line records as stored in the search index
//!
//! Field names follow the indexed document layout of the planning index,
//! which is shared with other consumers and cannot be renamed here.

use crate::domain::ids::{OrderId, OrderLineId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Indexed field names of an order line document
pub mod fields {
    pub const ORDER_ID: &str = "order_ID";
    pub const ORDER_LINE_ID: &str = "order_LN_ID";
    pub const MANIFEST_SOURCE_ID: &str = "mnfst_SRC_ID";
    pub const FREIGHT_TYPE: &str = "frght_TYPE";
    pub const LOAD_TYPE: &str = "order_LN_LOAD_TYPE";
    pub const STATUS: &str = "order_STTS";
    pub const WEIGHT: &str = "weight";
    pub const PALLET_COUNT: &str = "order_LN_PLET_CNT";
    pub const SEQUENCE: &str = "order_LN_SEQ";
    pub const PICKUP_START: &str = "order_LN_PCKUP_STRT_TM";
    pub const PICKUP_END: &str = "order_LN_PCKUP_END_TM";
    pub const DELIVERY_START: &str = "order_LN_DLVRY_STRT_TM";
    pub const DELIVERY_END: &str = "order_LN_DLVRY_END_TM";
    pub const COMMODITY_ID: &str = "cmdty_ID";
    pub const DISPATCH_COMMENT: &str = "order_LN_DLVRY_CMNT";
    pub const DISPATCH_INSTRUCTIONS: &str = "order_LN_DLVRY_INSTR";
    pub const MAX_TEMP: &str = "order_LN_MAX_TEMP";
    pub const MIN_TEMP: &str = "order_LN_MIN_TEMP";
    pub const PRIORITY: &str = "order_PRTY_TYPE";
    pub const REVENUE_MILES: &str = "rvnu_MI";
    pub const REVENUE_QUANTITY: &str = "rvnu_QTY";
    pub const UPDATE_DATE: &str = "updateDate";
    pub const UPDATE_USER_ID: &str = "updateUserId";
}

/// Planning status of an order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Not attached to any manifest yet
    Unplanned,
    /// Attached to a manifest
    Planned,
}

impl OrderStatus {
    /// Stored representation in both stores
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unplanned => "Unplanned",
            OrderStatus::Planned => "Planned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line as read from the search index
///
/// Only the attributes the rules and workflows read are typed; everything
/// else stays in the raw document held by callers that need a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "order_ID", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(rename = "order_LN_ID", deserialize_with = "string_or_number")]
    pub order_line_id: String,

    #[serde(rename = "mnfst_SRC_ID", default)]
    pub manifest_source_id: Option<String>,

    #[serde(rename = "frght_TYPE", default)]
    pub freight_type: Option<String>,

    #[serde(rename = "order_LN_LOAD_TYPE", default)]
    pub load_type: Option<String>,

    #[serde(rename = "order_STTS", default)]
    pub status: Option<String>,
}

impl Order {
    /// Parses an order from an indexed `_source` document
    pub fn from_document(document: &Value) -> crate::domain::Result<Self> {
        Ok(serde_json::from_value(document.clone())?)
    }
}

/// Order line ids are indexed as strings by some producers and numbers by others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for order line id, got {other}"
        ))),
    }
}

/// Editable details of an order line
///
/// Keys mirror the indexed document. Only fields that are present are
/// written to the index; the relational stored function receives the whole
/// set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDetailsUpdate {
    #[serde(rename = "order_LN_ID", default)]
    pub order_line_id: Option<String>,
    #[serde(rename = "order_LN_PCKUP_STRT_TM", default)]
    pub pickup_start_time: Option<String>,
    #[serde(rename = "order_LN_PCKUP_END_TM", default)]
    pub pickup_end_time: Option<String>,
    #[serde(rename = "order_LN_DLVRY_STRT_TM", default)]
    pub delivery_start_time: Option<String>,
    #[serde(rename = "order_LN_DLVRY_END_TM", default)]
    pub delivery_end_time: Option<String>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(rename = "order_LN_PLET_CNT", default)]
    pub pallet_count: Option<Value>,
    #[serde(rename = "cmdty_ID", default)]
    pub commodity_id: Option<Value>,
    #[serde(rename = "order_LN_DLVRY_CMNT", default)]
    pub dispatch_comment: Option<String>,
    #[serde(rename = "order_LN_DLVRY_INSTR", default)]
    pub dispatch_instructions: Option<String>,
    #[serde(rename = "order_LN_MAX_TEMP", default)]
    pub max_temp: Option<Value>,
    #[serde(rename = "order_LN_MIN_TEMP", default)]
    pub min_temp: Option<Value>,
    #[serde(rename = "order_PRTY_TYPE", default)]
    pub priority: Option<String>,
    #[serde(rename = "rvnu_MI", default)]
    pub revenue_miles: Option<Value>,
    #[serde(rename = "rvnu_QTY", default)]
    pub revenue_quantity: Option<Value>,
}

impl OrderDetailsUpdate {
    fn entries(&self) -> Vec<(&'static str, Option<Value>)> {
        let s = |v: &Option<String>| v.clone().map(Value::String);
        vec![
            (fields::PICKUP_START, s(&self.pickup_start_time)),
            (fields::PICKUP_END, s(&self.pickup_end_time)),
            (fields::DELIVERY_START, s(&self.delivery_start_time)),
            (fields::DELIVERY_END, s(&self.delivery_end_time)),
            (fields::WEIGHT, self.weight.clone()),
            (fields::PALLET_COUNT, self.pallet_count.clone()),
            (fields::COMMODITY_ID, self.commodity_id.clone()),
            (fields::DISPATCH_COMMENT, s(&self.dispatch_comment)),
            (fields::DISPATCH_INSTRUCTIONS, s(&self.dispatch_instructions)),
            (fields::MAX_TEMP, self.max_temp.clone()),
            (fields::MIN_TEMP, self.min_temp.clone()),
            (fields::PRIORITY, s(&self.priority)),
            (fields::REVENUE_MILES, self.revenue_miles.clone()),
            (fields::REVENUE_QUANTITY, self.revenue_quantity.clone()),
        ]
    }

    /// Indexed fields this update touches, with their new values
    pub fn index_fields(&self) -> Map<String, Value> {
        self.entries()
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect()
    }

    /// Argument passed to the relational `fn_update_order_details` function
    pub fn function_argument(
        &self,
        order_id: &OrderId,
        order_line_id: &OrderLineId,
        update_date: &str,
        update_user_id: i64,
    ) -> Value {
        serde_json::json!({
            "orderId": order_id.as_str(),
            "orderLineId": order_line_id.as_str(),
            "pickupStartTime": self.pickup_start_time,
            "pickupEndTime": self.pickup_end_time,
            "deliveryStartTime": self.delivery_start_time,
            "deliveryEndTime": self.delivery_end_time,
            "weight": self.weight,
            "palletCount": self.pallet_count,
            "commodityId": self.commodity_id,
            "dispatchComment": self.dispatch_comment,
            "dispatchInstructions": self.dispatch_instructions,
            "maxTemp": self.max_temp,
            "minTemp": self.min_temp,
            "priority": self.priority,
            "revenueMiles": self.revenue_miles,
            "revenueQuantity": self.revenue_quantity,
            "updateDate": update_date,
            "updateUserId": update_user_id,
        })
    }
}

/// New position of one order line within its manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSequenceEntry {
    #[serde(rename = "orderLineId")]
    pub order_line_id: String,
    pub sequence: i64,
}

/// Resequencing request for the orders of a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSequenceUpdate {
    #[serde(rename = "manifestSourceId")]
    pub manifest_source_id: String,
    pub orders: Vec<OrderSequenceEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_from_document() {
        let doc = json!({
            "order_LN_ID": "O1",
            "mnfst_SRC_ID": "M1",
            "frght_TYPE": "LTL",
            "order_LN_LOAD_TYPE": "Dry",
            "order_STTS": "Planned",
            "weight": "120.5"
        });
        let order = Order::from_document(&doc).unwrap();
        assert_eq!(order.order_line_id, "O1");
        assert_eq!(order.freight_type.as_deref(), Some("LTL"));
        assert_eq!(order.load_type.as_deref(), Some("Dry"));
    }

    #[test]
    fn test_order_line_id_may_be_numeric() {
        let order = Order::from_document(&json!({"order_LN_ID": 42})).unwrap();
        assert_eq!(order.order_line_id, "42");
        assert!(order.freight_type.is_none());
    }

    #[test]
    fn test_index_fields_only_contains_present_values() {
        let update = OrderDetailsUpdate {
            order_line_id: Some("O1".to_string()),
            weight: Some(json!("99")),
            priority: Some("High".to_string()),
            ..Default::default()
        };
        let fields = update.index_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("weight"), Some(&json!("99")));
        assert_eq!(fields.get("order_PRTY_TYPE"), Some(&json!("High")));
    }

    #[test]
    fn test_function_argument_uses_camel_case_keys() {
        let update = OrderDetailsUpdate {
            pallet_count: Some(json!(4)),
            ..Default::default()
        };
        let arg = update.function_argument(
            &OrderId::new("1001").unwrap(),
            &OrderLineId::new("O1").unwrap(),
            "2024-01-01T00:00:00Z",
            9999,
        );
        assert_eq!(arg["orderId"], json!("1001"));
        assert_eq!(arg["orderLineId"], json!("O1"));
        assert_eq!(arg["palletCount"], json!(4));
        assert_eq!(arg["updateUserId"], json!(9999));
        assert!(arg["weight"].is_null());
    }
}
