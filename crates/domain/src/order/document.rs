//! Persisted and wire shape of an order.
//!
//! The document keeps the field names the store has always used
//! (`idUsuario`, `cliente`, `lineasPedido`, ...). Derived fields are written
//! for readers but never trusted on load: [`Order`] recomputes them.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

use super::{Address, CustomerSnapshot, LineItem, Money, Order};

/// Order document as stored and as broadcast to sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    pub id: OrderId,
    pub id_usuario: i64,
    pub cliente: ClienteDocument,
    pub lineas_pedido: Vec<LineaPedidoDocument>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub total_items: i64,

    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClienteDocument {
    pub nombre_completo: String,
    pub email: String,
    pub telefono: String,
    pub direccion: DireccionDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DireccionDocument {
    pub calle: String,
    pub numero: String,
    pub ciudad: String,
    pub provincia: String,
    pub pais: String,
    pub codigo_postal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineaPedidoDocument {
    pub id_producto: i64,
    pub precio_producto: f64,
    pub cantidad: i64,

    #[serde(default)]
    pub total: f64,
}

impl From<&Order> for OrderDocument {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            id_usuario: order.user_id().as_i64(),
            cliente: order.customer().into(),
            lineas_pedido: order.line_items().iter().map(Into::into).collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            is_deleted: order.is_deleted(),
            total_items: i64::try_from(order.total_items()).unwrap_or(i64::MAX),
            total: order.total().as_amount(),
        }
    }
}

impl TryFrom<OrderDocument> for Order {
    type Error = DocumentError;

    fn try_from(doc: OrderDocument) -> Result<Self, Self::Error> {
        let line_items = doc
            .lineas_pedido
            .into_iter()
            .map(LineItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Order::restore(
            doc.id,
            UserId::new(doc.id_usuario),
            doc.cliente.into(),
            line_items,
            doc.created_at,
            doc.updated_at,
            doc.is_deleted,
        ))
    }
}

impl From<&CustomerSnapshot> for ClienteDocument {
    fn from(customer: &CustomerSnapshot) -> Self {
        let address = &customer.address;
        Self {
            nombre_completo: customer.full_name.clone(),
            email: customer.email.clone(),
            telefono: customer.phone.clone(),
            direccion: DireccionDocument {
                calle: address.street.clone(),
                numero: address.number.clone(),
                ciudad: address.city.clone(),
                provincia: address.province.clone(),
                pais: address.country.clone(),
                codigo_postal: address.postal_code.clone(),
            },
        }
    }
}

impl From<ClienteDocument> for CustomerSnapshot {
    fn from(doc: ClienteDocument) -> Self {
        let d = doc.direccion;
        Self {
            full_name: doc.nombre_completo,
            email: doc.email,
            phone: doc.telefono,
            address: Address {
                street: d.calle,
                number: d.numero,
                city: d.ciudad,
                province: d.provincia,
                country: d.pais,
                postal_code: d.codigo_postal,
            },
        }
    }
}

impl From<&LineItem> for LineaPedidoDocument {
    fn from(item: &LineItem) -> Self {
        Self {
            id_producto: item.product_id.as_i64(),
            precio_producto: item.unit_price.as_amount(),
            cantidad: i64::from(item.quantity),
            total: item.line_total().as_amount(),
        }
    }
}

impl TryFrom<LineaPedidoDocument> for LineItem {
    type Error = DocumentError;

    fn try_from(doc: LineaPedidoDocument) -> Result<Self, Self::Error> {
        let product_id = ProductId::new(doc.id_producto);
        let unit_price =
            Money::from_amount(doc.precio_producto).ok_or(DocumentError::InvalidAmount {
                product_id,
                amount: doc.precio_producto,
            })?;
        let quantity = u32::try_from(doc.cantidad).map_err(|_| DocumentError::InvalidQuantity {
            product_id,
            quantity: doc.cantidad,
        })?;
        Ok(LineItem::new(product_id, unit_price, quantity))
    }
}
