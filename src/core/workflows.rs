//! Coordinated write plans for order workflows
//!
//! Each function turns a validated request plus the index snapshots taken
//! before any write into the ordered [`Step`]s run by the coordinator.
//!
//! | Workflow       | Order of writes                         | Undo                      |
//! |----------------|-----------------------------------------|---------------------------|
//! | reassignment   | relational update, index update         | rollback, inverse patch   |
//! | order details  | index update, stored function           | inverse patch, rollback   |
//! | order sequence | index update per order, stored function | inverse patches, rollback |

use crate::adapters::relational::{columns, functions, Fields, Table};
use crate::adapters::search::{FieldPatch, Query};
use crate::core::coordinator::{NotFound, Step};
use crate::domain::ids::{ManifestSourceId, OrderId, OrderLineId};
use crate::domain::order::fields;
use crate::domain::{OrderDetailsUpdate, OrderStatus};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

pub const UPDATE_ORDER_DETAILS_FUNCTION: &str = functions::UPDATE_ORDER_DETAILS;
pub const UPDATE_ORDER_SEQUENCE_FUNCTION: &str = functions::UPDATE_ORDER_SEQUENCE;

/// Audit stamp written with every order update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStamp {
    /// RFC 3339 UTC timestamp
    pub date: String,
    pub user_id: i64,
}

impl UpdateStamp {
    pub fn now(user_id: i64) -> Self {
        Self {
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id,
        }
    }

    fn stamp(&self, patch: FieldPatch) -> FieldPatch {
        patch
            .set(fields::UPDATE_DATE, self.date.as_str())
            .set(fields::UPDATE_USER_ID, self.user_id)
    }
}

fn order_query(order_line_id: &OrderLineId) -> Query {
    Query::terms(fields::ORDER_LINE_ID, [order_line_id.as_str()])
}

/// Moves one order line onto a manifest and marks it planned
pub fn reassignment_steps(
    order_line_id: &OrderLineId,
    manifest_source_id: &ManifestSourceId,
    snapshot: &Value,
    orders_index: &str,
) -> Vec<Step> {
    let not_found = NotFound::Order(order_line_id.to_string());
    let patch = FieldPatch::new()
        .set(fields::STATUS, OrderStatus::Planned.as_str())
        .set(fields::MANIFEST_SOURCE_ID, manifest_source_id.as_str());
    let inverse = patch.inverse_from(snapshot);

    vec![
        Step::update(
            "relational:orderline-reassign",
            Table::Orderline,
            Fields::new()
                .with(columns::MANIFEST_SOURCE_ID, manifest_source_id.as_str())
                .with(columns::ORDERLINE_STATUS, OrderStatus::Planned.as_str()),
            Fields::new().with(columns::ORDERLINE_ID, order_line_id.as_str()),
        )
        .require_match(not_found.clone()),
        Step::index_update(
            "index:order-reassign",
            orders_index,
            order_query(order_line_id),
            patch,
        )
        .compensated_by(inverse)
        .require_match(not_found),
    ]
}

/// Writes edited order details to the index, then to the relational store
/// through its stored function
pub fn order_details_steps(
    order_id: &OrderId,
    order_line_id: &OrderLineId,
    details: &OrderDetailsUpdate,
    snapshot: &Value,
    stamp: &UpdateStamp,
    orders_index: &str,
) -> Vec<Step> {
    let patch = stamp.stamp(FieldPatch::from(details.index_fields()));
    let inverse = patch.inverse_from(snapshot);
    let argument = details.function_argument(order_id, order_line_id, &stamp.date, stamp.user_id);

    vec![
        Step::index_update(
            "index:order-details",
            orders_index,
            order_query(order_line_id),
            patch,
        )
        .compensated_by(inverse)
        .require_match(NotFound::Order(order_line_id.to_string())),
        Step::call_function(
            "relational:order-details",
            UPDATE_ORDER_DETAILS_FUNCTION,
            argument,
        )
        .require_match(NotFound::Order(order_line_id.to_string())),
    ]
}

/// Writes new sequence numbers for the orders of a manifest
///
/// `orders` pairs each order line with its new sequence number and the
/// index document taken before the update. The stored function must update
/// every listed order line on the manifest.
pub fn order_sequence_steps(
    manifest_source_id: &ManifestSourceId,
    orders: &[(OrderLineId, i64, Value)],
    stamp: &UpdateStamp,
    orders_index: &str,
) -> Vec<Step> {
    let mut steps: Vec<Step> = orders
        .iter()
        .map(|(order_line_id, sequence, snapshot)| {
            let patch = stamp.stamp(FieldPatch::new().set(fields::SEQUENCE, *sequence));
            let inverse = patch.inverse_from(snapshot);
            Step::index_update(
                format!("index:order-sequence-{order_line_id}"),
                orders_index,
                order_query(order_line_id),
                patch,
            )
            .compensated_by(inverse)
            .require_match(NotFound::Order(order_line_id.to_string()))
        })
        .collect();

    let entries: Vec<Value> = orders
        .iter()
        .map(|(order_line_id, sequence, _)| {
            json!({"orderLineId": order_line_id.as_str(), "sequence": sequence})
        })
        .collect();

    let order_line_ids: Vec<&str> = orders.iter().map(|(id, _, _)| id.as_str()).collect();

    steps.push(
        Step::call_function(
            "relational:order-sequence",
            UPDATE_ORDER_SEQUENCE_FUNCTION,
            json!({
                "manifestSourceId": manifest_source_id.as_str(),
                "orders": entries,
                "updateDate": stamp.date,
                "updateUserId": stamp.user_id,
            }),
        )
        .require_matches(orders.len() as u64, NotFound::Order(order_line_ids.join(", "))),
    );
    steps
}
