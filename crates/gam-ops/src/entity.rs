//! Declarative descriptor table for the supported entity kinds.
//!
//! Each kind maps to a static [`EntityDef`] row naming the remote service,
//! the listing method, the (optional) creation method, field allowlists, and
//! the shaping functions applied to construction parameters and per-name
//! create payloads. Kinds without a creation method are read-only.

use crate::record::Record;

/// Tag for one kind of remote advertising entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    AdUnit,
    Advertiser,
    CurrentNetwork,
    CurrentUser,
    Placement,
    TargetingKey,
    TargetingValues,
    LineItem,
    Order,
    Creative,
    CreativeVideo,
    CreativeBanner,
}

/// Static contract for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct EntityDef {
    /// Remote service name, e.g. `LineItemService`.
    pub service: &'static str,
    /// Remote listing/query method.
    pub list_method: &'static str,
    /// Remote creation method; `None` marks the kind read-only.
    pub create_method: Option<&'static str>,
    /// Allowlist restricting which params are sent in listing filters.
    pub query_fields: Option<&'static [&'static str]>,
    /// Allowlist applied to create payloads at the transport boundary.
    pub create_fields: Option<&'static [&'static str]>,
    /// Construction-time shaping: immutable params in, populated params out.
    pub defaults: Option<fn(&Record) -> Record>,
    /// Per-name create payload builder for name-set reconciliation.
    pub value_payload: Option<fn(&Record, &str) -> Record>,
    /// Whether construction seeds the dry-run buffer with `[{id: "<name>-0"}]`.
    pub seeds_dry_run: bool,
}

const AD_UNIT: EntityDef = EntityDef {
    service: "InventoryService",
    list_method: "getAdUnitsByStatement",
    create_method: None,
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: false,
};

const ADVERTISER: EntityDef = EntityDef {
    service: "CompanyService",
    list_method: "getCompaniesByStatement",
    create_method: Some("createCompanies"),
    query_fields: None,
    create_fields: None,
    defaults: Some(advertiser_defaults),
    value_payload: None,
    seeds_dry_run: true,
};

const CURRENT_NETWORK: EntityDef = EntityDef {
    service: "NetworkService",
    list_method: "getCurrentNetwork",
    create_method: None,
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: false,
};

const CURRENT_USER: EntityDef = EntityDef {
    service: "UserService",
    list_method: "getCurrentUser",
    create_method: None,
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: false,
};

const PLACEMENT: EntityDef = EntityDef {
    service: "PlacementService",
    list_method: "getPlacementsByStatement",
    create_method: None,
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: false,
};

const TARGETING_KEY: EntityDef = EntityDef {
    service: "CustomTargetingService",
    list_method: "getCustomTargetingKeysByStatement",
    create_method: Some("createCustomTargetingKeys"),
    query_fields: None,
    create_fields: None,
    defaults: Some(targeting_key_defaults),
    value_payload: None,
    seeds_dry_run: true,
};

const TARGETING_VALUES: EntityDef = EntityDef {
    service: "CustomTargetingService",
    list_method: "getCustomTargetingValuesByStatement",
    create_method: Some("createCustomTargetingValues"),
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: Some(targeting_value_payload),
    seeds_dry_run: false,
};

const LINE_ITEM: EntityDef = EntityDef {
    service: "LineItemService",
    list_method: "getLineItemsByStatement",
    create_method: Some("createLineItems"),
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: false,
};

const ORDER: EntityDef = EntityDef {
    service: "OrderService",
    list_method: "getOrdersByStatement",
    create_method: Some("createOrders"),
    query_fields: None,
    create_fields: None,
    defaults: None,
    value_payload: None,
    seeds_dry_run: true,
};

const CREATIVE: EntityDef = EntityDef {
    service: "CreativeService",
    list_method: "getCreativesByStatement",
    create_method: Some("createCreatives"),
    query_fields: Some(&["id", "name", "advertiserId", "width", "height"]),
    create_fields: None,
    defaults: Some(creative_defaults),
    value_payload: None,
    seeds_dry_run: false,
};

const CREATIVE_VIDEO: EntityDef = EntityDef {
    service: "CreativeService",
    list_method: "getCreativesByStatement",
    create_method: Some("createCreatives"),
    query_fields: Some(&["id", "name", "advertiserId", "width", "height"]),
    create_fields: Some(&[
        "xsi_type",
        "name",
        "advertiserId",
        "size",
        "vastXmlUrl",
        "vastRedirectType",
        "duration",
    ]),
    defaults: Some(creative_video_defaults),
    value_payload: None,
    seeds_dry_run: false,
};

const CREATIVE_BANNER: EntityDef = EntityDef {
    service: "CreativeService",
    list_method: "getCreativesByStatement",
    create_method: Some("createCreatives"),
    query_fields: Some(&["id", "name", "advertiserId", "width", "height"]),
    create_fields: Some(&[
        "xsi_type",
        "name",
        "advertiserId",
        "size",
        "isSafeFrameCompatible",
        "snippet",
    ]),
    defaults: Some(creative_banner_defaults),
    value_payload: None,
    seeds_dry_run: false,
};

impl EntityKind {
    /// Descriptor row for this kind.
    pub fn def(self) -> &'static EntityDef {
        match self {
            EntityKind::AdUnit => &AD_UNIT,
            EntityKind::Advertiser => &ADVERTISER,
            EntityKind::CurrentNetwork => &CURRENT_NETWORK,
            EntityKind::CurrentUser => &CURRENT_USER,
            EntityKind::Placement => &PLACEMENT,
            EntityKind::TargetingKey => &TARGETING_KEY,
            EntityKind::TargetingValues => &TARGETING_VALUES,
            EntityKind::LineItem => &LINE_ITEM,
            EntityKind::Order => &ORDER,
            EntityKind::Creative => &CREATIVE,
            EntityKind::CreativeVideo => &CREATIVE_VIDEO,
            EntityKind::CreativeBanner => &CREATIVE_BANNER,
        }
    }

    /// True when the kind declares no creation method.
    pub fn is_read_only(self) -> bool {
        self.def().create_method.is_none()
    }
}

fn set_if_absent(rec: &mut Record, field: &str, value: impl Into<serde_json::Value>) {
    if !rec.contains(field) {
        rec.set(field, value);
    }
}

fn advertiser_defaults(params: &Record) -> Record {
    let mut out = params.clone();
    set_if_absent(&mut out, "type", "ADVERTISER");
    out
}

fn targeting_key_defaults(params: &Record) -> Record {
    let mut out = params.clone();
    if let Some(name) = params.name() {
        let name = name.to_string();
        set_if_absent(&mut out, "displayName", name);
    }
    set_if_absent(&mut out, "type", "PREDEFINED");
    out
}

/// Derives flat `width`/`height` from a nested `size` object.
fn creative_defaults(params: &Record) -> Record {
    let mut out = params.clone();
    if let Some(size) = params.get("size") {
        if let Some(height) = size.get("height") {
            out.set("height", height.clone());
        }
        if let Some(width) = size.get("width") {
            out.set("width", width.clone());
        }
    }
    out
}

fn creative_video_defaults(params: &Record) -> Record {
    let mut out = creative_defaults(params);
    set_if_absent(&mut out, "xsi_type", "VastRedirectCreative");
    set_if_absent(&mut out, "vastRedirectType", "LINEAR");
    set_if_absent(&mut out, "duration", 60);
    out
}

fn creative_banner_defaults(params: &Record) -> Record {
    let mut out = creative_defaults(params);
    set_if_absent(&mut out, "xsi_type", "ThirdPartyCreative");
    set_if_absent(&mut out, "isSafeFrameCompatible", true);
    out
}

/// Create payload for one custom-targeting value. `matchType` defaults to
/// `EXACT` unless the op's params carry an override.
fn targeting_value_payload(params: &Record, name: &str) -> Record {
    let mut rec = Record::new();
    if let Some(key_id) = params.get("customTargetingKeyId") {
        rec.set("customTargetingKeyId", key_id.clone());
    }
    rec.set("name", name);
    rec.set("displayName", name);
    match params.get("matchType") {
        Some(match_type) => rec.set("matchType", match_type.clone()),
        None => rec.set("matchType", "EXACT"),
    }
    rec
}
