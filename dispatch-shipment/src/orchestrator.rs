use crate::models::{PaymentMode, ShipmentRecord, ShipmentRequest};
use crate::repository::ShipmentRepository;
use dispatch_core::carrier::{
    CarrierApi, PickupLocationRef, ShipmentPackage, ShipmentPayload,
};
use dispatch_core::order::{OrderGateway, OrderShipmentUpdate, OrderSnapshot, OrderStatus};
use dispatch_core::warehouse::WarehouseRegistry;
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::money;
use dispatch_waybill::{WaybillAllocator, WaybillSource};
use std::sync::Arc;

/// Builds a carrier shipment from an order, enforcing idempotency and
/// the waybill claim/commit/release discipline.
///
/// Side effects per call: one guard record insert, one record update,
/// one waybill commit or release, and (on success) one order mutation.
/// Every failure path releases the claimed waybill and leaves a Failed
/// record, so nothing stays Reserved and retry remains possible.
pub struct ShipmentOrchestrator {
    shipments: Arc<dyn ShipmentRepository>,
    orders: Arc<dyn OrderGateway>,
    warehouses: Arc<dyn WarehouseRegistry>,
    allocator: Arc<WaybillAllocator>,
    carrier: Arc<dyn CarrierApi>,
}

impl ShipmentOrchestrator {
    pub fn new(
        shipments: Arc<dyn ShipmentRepository>,
        orders: Arc<dyn OrderGateway>,
        warehouses: Arc<dyn WarehouseRegistry>,
        allocator: Arc<WaybillAllocator>,
        carrier: Arc<dyn CarrierApi>,
    ) -> Self {
        Self {
            shipments,
            orders,
            warehouses,
            allocator,
            carrier,
        }
    }

    pub async fn create_shipment(
        &self,
        request: ShipmentRequest,
    ) -> DispatchResult<ShipmentRecord> {
        let order_id = request.order_id.clone();

        let snapshot = self
            .orders
            .fetch(&order_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("order {}", order_id)))?;

        self.validate_preconditions(&snapshot)?;

        let warehouse = self
            .warehouses
            .resolve(&request.pickup_location)
            .await?
            .ok_or_else(|| {
                DispatchError::InvalidArgument(format!(
                    "unknown pickup location {}",
                    request.pickup_location
                ))
            })?;
        if !warehouse.active {
            return Err(DispatchError::InvalidArgument(format!(
                "pickup location {} is inactive",
                warehouse.name
            )));
        }

        // Idempotency guard: the repository refuses a second live
        // record for the same order atomically, so a concurrent
        // duplicate loses here rather than at the carrier.
        let mut record = ShipmentRecord::pending(&request);
        self.shipments.begin_shipment(record.clone()).await?;

        let waybill = match self
            .allocator
            .allocate(1, true, Some(&order_id))
            .await
            .and_then(|mut v| {
                v.pop().ok_or_else(|| {
                    DispatchError::Transient("allocator returned no waybill".into())
                })
            }) {
            Ok(wb) => wb,
            Err(e) => {
                record.mark_failed(format!("waybill allocation failed: {}", e), None);
                self.shipments.update(&record).await?;
                return Err(e);
            }
        };

        if waybill.source == WaybillSource::LocalFallback {
            self.release(&waybill.code).await;
            record.mark_failed(
                "carrier not configured; refusing local-fallback waybill for a real shipment"
                    .into(),
                None,
            );
            self.shipments.update(&record).await?;
            return Err(DispatchError::Configuration(
                "cannot create a carrier shipment with a local-fallback waybill".into(),
            ));
        }

        let payload = build_payload(&snapshot, &request, &waybill.code);

        tracing::info!(order = %order_id, waybill = %waybill.code, "creating carrier shipment");
        match self.carrier.create_shipment(&payload).await {
            Ok(response) if response.success => {
                let response_json = serde_json::to_value(&response)
                    .unwrap_or(serde_json::Value::Null);
                self.allocator
                    .inventory()
                    .commit(&[waybill.code.clone()])?;
                record.mark_created(waybill.code.clone(), response_json.clone());
                self.shipments.update(&record).await?;

                self.orders
                    .record_shipment(
                        &order_id,
                        OrderShipmentUpdate {
                            shipment_created: true,
                            shipment_status: "CREATED".into(),
                            waybill_number: Some(waybill.code.clone()),
                            shipment_details: response_json,
                            new_status: Some(OrderStatus::Processing),
                        },
                    )
                    .await?;

                if let Some(status) = response.packages.iter().find_map(|p| p.status.clone()) {
                    let _ = self
                        .warehouses
                        .record_carrier_status(&warehouse.name, &status)
                        .await;
                }

                Ok(record)
            }
            Ok(response) => {
                // Logical rejection (e.g. non-serviceable pincode): keep
                // the carrier's remark verbatim, free the waybill, leave
                // the order untouched so the operator can retry.
                let remark = response
                    .remark()
                    .unwrap_or("carrier rejected the shipment without a remark")
                    .to_string();
                tracing::warn!(order = %order_id, remark = %remark, "carrier rejected shipment");
                self.release(&waybill.code).await;
                record.mark_failed(
                    remark,
                    serde_json::to_value(&response).ok(),
                );
                self.shipments.update(&record).await?;
                Ok(record)
            }
            Err(e) => {
                self.release(&waybill.code).await;
                record.mark_failed(e.to_string(), None);
                self.shipments.update(&record).await?;
                Err(e)
            }
        }
    }

    fn validate_preconditions(&self, snapshot: &OrderSnapshot) -> DispatchResult<()> {
        if !snapshot.status.allows_shipment() {
            return Err(DispatchError::InvalidArgument(format!(
                "order {} is not in a shippable state ({:?})",
                snapshot.order_ref, snapshot.status
            )));
        }
        if snapshot.items.is_empty() {
            return Err(DispatchError::InvalidArgument(format!(
                "order {} has no line items",
                snapshot.order_ref
            )));
        }
        let address = &snapshot.address;
        if address.name.trim().is_empty() || address.line1.trim().is_empty() {
            return Err(DispatchError::InvalidArgument(format!(
                "order {} address is incomplete (name and line1 required)",
                snapshot.order_ref
            )));
        }
        if address.resolved_pincode().is_none() {
            return Err(DispatchError::InvalidArgument(format!(
                "order {} address has no pincode",
                snapshot.order_ref
            )));
        }
        Ok(())
    }

    async fn release(&self, code: &str) {
        if let Err(e) = self.allocator.inventory().release(&[code.to_string()]) {
            tracing::error!(waybill = %code, error = %e, "failed to release waybill");
        }
    }
}

/// Build the carrier payload. `cod_amount` is always present: the order
/// total for COD, "0" for prepaid. Omitting it on COD is a known
/// terminal carrier-side rejection, prevented here rather than
/// diagnosed after the fact.
fn build_payload(
    snapshot: &OrderSnapshot,
    request: &ShipmentRequest,
    waybill: &str,
) -> ShipmentPayload {
    let address = &snapshot.address;
    let total = money::round2(snapshot.total_amount());
    let total_str = money::amount_string(total);
    let cod_amount = match request.payment_mode {
        PaymentMode::Cod => total_str.clone(),
        PaymentMode::Prepaid => "0".to_string(),
    };

    let products_desc = if request.packages.is_empty() {
        snapshot
            .items
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        request
            .packages
            .iter()
            .map(|p| p.description.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let quantity: u32 = snapshot.items.iter().map(|i| i.quantity).sum();

    ShipmentPayload {
        shipments: vec![ShipmentPackage {
            name: address.name.clone(),
            add: match &address.line2 {
                Some(line2) if !line2.is_empty() => {
                    format!("{}, {}", address.line1, line2)
                }
                _ => address.line1.clone(),
            },
            pin: address.resolved_pincode().unwrap_or_default().to_string(),
            city: address.city.clone().unwrap_or_default(),
            state: address.state.clone().unwrap_or_default(),
            country: address.country.clone().unwrap_or_else(|| "India".into()),
            phone: address.phone.clone().unwrap_or_default(),
            order: snapshot.order_ref.to_string(),
            payment_mode: request.payment_mode.as_carrier_str().to_string(),
            cod_amount,
            total_amount: total_str,
            products_desc,
            quantity: quantity.max(1),
            waybill: waybill.to_string(),
            shipment_mode: request.shipping_mode.as_carrier_str().to_string(),
            weight: request.weight,
            shipment_length: request.dimensions.map(|d| d.length),
            shipment_width: request.dimensions.map(|d| d.width),
            shipment_height: request.dimensions.map(|d| d.height),
        }],
        pickup_location: PickupLocationRef {
            name: request.pickup_location.clone(),
        },
    }
}
