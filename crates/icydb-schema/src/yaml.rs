//! Catalog on-disk form (spec.md §6 / §4.2): a top-level YAML mapping from
//! entity name to a mapping carrying `"#Directory"`, `"#PrimaryKey"`,
//! `"#Index"`, and per-field declarations. Round-trips bijectively with the
//! in-memory catalog (spec.md P1), including nested
//! `optional<array<T>>` and the inline `field: type#kind(k:v, …)` /
//! block `#Index` syntaxes.

use crate::node::{
    DirectoryComponent, Entity, FieldSchema, IndexDescriptor, IndexKind, MetaMap, MetaValue,
    PrimaryKeyDef,
};
use crate::Catalog;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::PrimitiveType;
use serde_yaml::{Mapping, Value};

fn parse_err(message: impl Into<String>) -> InternalError {
    InternalError::new(ErrorClass::ParseError, ErrorOrigin::Catalog, message.into())
}

/// Export the whole catalog to its YAML textual form.
pub fn export_catalog(catalog: &Catalog) -> Result<String, InternalError> {
    let mut top = Mapping::new();
    for entity in catalog.entities() {
        top.insert(Value::String(entity.type_name.clone()), export_entity(entity));
    }
    serde_yaml::to_string(&Value::Mapping(top))
        .map_err(|e| parse_err(format!("yaml export failed: {e}")))
}

/// Parse a catalog from its YAML textual form.
pub fn import_catalog(text: &str) -> Result<Catalog, InternalError> {
    let doc: Value = serde_yaml::from_str(text).map_err(|e| parse_err(format!("yaml parse failed: {e}")))?;
    let top = doc
        .as_mapping()
        .ok_or_else(|| parse_err("catalog document must be a top-level mapping"))?;

    let mut catalog = Catalog::new();
    for (key, value) in top {
        let name = key
            .as_str()
            .ok_or_else(|| parse_err("entity name key must be a string"))?;
        let entity = import_entity(name, value)?;
        catalog.upsert_raw(entity);
    }
    Ok(catalog)
}

// ---------------------------------------------------------------------
// Entity <-> mapping
// ---------------------------------------------------------------------

fn export_entity(entity: &Entity) -> Value {
    let mut map = Mapping::new();

    let directory: Vec<Value> = entity
        .directory
        .iter()
        .map(|c| match c {
            DirectoryComponent::Static(s) => Value::String(s.clone()),
            DirectoryComponent::Dynamic(f) => {
                let mut m = Mapping::new();
                m.insert(Value::String("field".into()), Value::String(f.clone()));
                Value::Mapping(m)
            }
        })
        .collect();
    if !directory.is_empty() {
        map.insert(Value::String("#Directory".into()), Value::Sequence(directory));
    }

    map.insert(
        Value::String("#PrimaryKey".into()),
        Value::Sequence(
            entity
                .primary_key
                .fields
                .iter()
                .map(|f| Value::String(f.clone()))
                .collect(),
        ),
    );

    let mut ordered_fields: Vec<&FieldSchema> = entity.fields.fields.iter().collect();
    ordered_fields.sort_by_key(|f| f.field_number);

    // Inline index on a single field exports onto the field line itself;
    // everything else exports as a block #Index entry.
    let inline_eligible = |idx: &IndexDescriptor| idx.fields.len() == 1 && idx.kind != IndexKind::Graph;

    for field in ordered_fields {
        let mut ty = String::new();
        if field.is_optional {
            ty.push_str("optional<");
        }
        if field.is_array {
            ty.push_str("array<");
        }
        ty.push_str(field.ty.name());
        if field.is_array {
            ty.push('>');
        }
        if field.is_optional {
            ty.push('>');
        }

        if let Some(idx) = entity
            .indexes
            .iter()
            .find(|idx| inline_eligible(idx) && idx.fields[0] == field.name)
        {
            ty.push('#');
            ty.push_str(&render_kind_spec(idx));
        }

        map.insert(Value::String(field.name.clone()), Value::String(ty));
    }

    let block_indexes: Vec<Value> = entity
        .indexes
        .iter()
        .filter(|idx| !inline_eligible(idx))
        .map(export_block_index)
        .collect();
    if !block_indexes.is_empty() {
        map.insert(Value::String("#Index".into()), Value::Sequence(block_indexes));
    }

    Value::Mapping(map)
}

fn render_kind_spec(idx: &IndexDescriptor) -> String {
    let mut parts = vec![format!("name:{}", idx.name)];
    if idx.unique {
        parts.push("unique:true".into());
    }
    if idx.sparse {
        parts.push("sparse:true".into());
    }
    for (k, v) in &idx.metadata {
        parts.push(format!("{k}:{v}"));
    }
    format!("{}({})", idx.kind, parts.join(", "))
}

fn export_block_index(idx: &IndexDescriptor) -> Value {
    let mut m = Mapping::new();
    m.insert(Value::String("name".into()), Value::String(idx.name.clone()));
    m.insert(Value::String("kind".into()), Value::String(idx.kind.name().into()));
    if idx.kind == IndexKind::Graph && idx.fields.len() >= 3 {
        m.insert(Value::String("from".into()), Value::String(idx.fields[0].clone()));
        m.insert(Value::String("edge".into()), Value::String(idx.fields[1].clone()));
        m.insert(Value::String("to".into()), Value::String(idx.fields[2].clone()));
    } else {
        m.insert(
            Value::String("fields".into()),
            Value::Sequence(idx.fields.iter().cloned().map(Value::String).collect()),
        );
    }
    if idx.unique {
        m.insert(Value::String("unique".into()), Value::Bool(true));
    }
    if idx.sparse {
        m.insert(Value::String("sparse".into()), Value::Bool(true));
    }
    for (k, v) in &idx.metadata {
        m.insert(Value::String(k.clone()), meta_value_to_yaml(v));
    }
    Value::Mapping(m)
}

fn meta_value_to_yaml(v: &MetaValue) -> Value {
    match v {
        MetaValue::Bool(b) => Value::Bool(*b),
        MetaValue::Int(i) => Value::Number((*i).into()),
        MetaValue::Text(s) => Value::String(s.clone()),
    }
}

fn import_entity(name: &str, value: &Value) -> Result<Entity, InternalError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| parse_err(format!("entity {name} must be a mapping")))?;

    let mut directory = Vec::new();
    let mut primary_key_fields = Vec::new();
    let mut block_indexes_raw = Vec::new();
    let mut field_lines: Vec<(String, String)> = Vec::new();

    for (key, val) in map {
        let key_str = key
            .as_str()
            .ok_or_else(|| parse_err(format!("entity {name}: non-string key")))?;
        match key_str {
            "#Directory" => {
                let seq = val
                    .as_sequence()
                    .ok_or_else(|| parse_err(format!("entity {name}: #Directory must be a list")))?;
                for item in seq {
                    directory.push(import_directory_component(name, item)?);
                }
            }
            "#PrimaryKey" => {
                let seq = val
                    .as_sequence()
                    .ok_or_else(|| parse_err(format!("entity {name}: #PrimaryKey must be a list")))?;
                for item in seq {
                    let s = item
                        .as_str()
                        .ok_or_else(|| parse_err(format!("entity {name}: #PrimaryKey entries must be strings")))?;
                    primary_key_fields.push(s.to_string());
                }
            }
            "#Index" => {
                let seq = val
                    .as_sequence()
                    .ok_or_else(|| parse_err(format!("entity {name}: #Index must be a list")))?;
                for item in seq {
                    block_indexes_raw.push(item.clone());
                }
            }
            field_name => {
                let spec = val.as_str().ok_or_else(|| {
                    parse_err(format!("entity {name}: field {field_name} must be a string"))
                })?;
                field_lines.push((field_name.to_string(), spec.to_string()));
            }
        }
    }

    if primary_key_fields.is_empty() {
        primary_key_fields.push(
            field_lines
                .first()
                .map(|(n, _)| n.clone())
                .ok_or_else(|| parse_err(format!("entity {name}: no fields declared")))?,
        );
    }

    let mut entity = Entity::new(name, PrimaryKeyDef::new(primary_key_fields));
    entity.directory = directory;

    for (number, (field_name, spec)) in field_lines.iter().enumerate() {
        let (field, inline_index) = parse_field_line(field_name, spec, number as u32)?;
        entity.fields.fields.push(field);
        if let Some(idx) = inline_index {
            entity.indexes.push(idx);
        }
    }

    for raw in block_indexes_raw {
        entity.indexes.push(import_block_index(name, &raw)?);
    }

    Ok(entity)
}

fn import_directory_component(entity_name: &str, item: &Value) -> Result<DirectoryComponent, InternalError> {
    if let Some(s) = item.as_str() {
        return Ok(DirectoryComponent::Static(s.to_string()));
    }
    if let Some(m) = item.as_mapping() {
        if let Some(field) = m.get(Value::String("field".into())).and_then(Value::as_str) {
            return Ok(DirectoryComponent::Dynamic(field.to_string()));
        }
    }
    Err(parse_err(format!(
        "entity {entity_name}: #Directory entries must be a string or {{field: name}}"
    )))
}

/// Parse `name: [optional<][array<]primitive[>][>][#kind(k:v, …)]`.
fn parse_field_line(
    field_name: &str,
    spec: &str,
    field_number: u32,
) -> Result<(FieldSchema, Option<IndexDescriptor>), InternalError> {
    let (type_part, kind_part) = match spec.split_once('#') {
        Some((t, k)) => (t, Some(k)),
        None => (spec, None),
    };

    let mut rest = type_part.trim();
    let mut is_optional = false;
    let mut is_array = false;
    let mut close_count = 0usize;

    if let Some(stripped) = rest.strip_prefix("optional<") {
        is_optional = true;
        close_count += 1;
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix("array<") {
        is_array = true;
        close_count += 1;
        rest = stripped;
    }
    let primitive_name = rest.trim_end_matches('>');
    let trailing_closes = rest.len() - primitive_name.len();
    if trailing_closes != close_count {
        return Err(parse_err(format!(
            "field {field_name}: unbalanced angle brackets in type `{type_part}`"
        )));
    }

    let ty = PrimitiveType::parse(primitive_name).ok_or_else(|| {
        parse_err(format!(
            "field {field_name}: unknown primitive type `{primitive_name}`"
        ))
    })?;

    let mut field = FieldSchema::new(field_name, field_number, ty);
    field.is_optional = is_optional;
    field.is_array = is_array;

    let inline_index = kind_part
        .map(|k| parse_kind_spec(field_name, &[field_name.to_string()], k))
        .transpose()?;

    Ok((field, inline_index))
}

/// Parse `kind(key:value, key2:value2)`.
fn parse_kind_spec(
    default_name: &str,
    fields: &[String],
    spec: &str,
) -> Result<IndexDescriptor, InternalError> {
    let spec = spec.trim();
    let (kind_name, args) = spec
        .split_once('(')
        .map(|(k, rest)| (k, rest.strip_suffix(')').unwrap_or(rest)))
        .unwrap_or((spec, ""));

    let kind = IndexKind::parse(kind_name.trim())
        .ok_or_else(|| parse_err(format!("unknown index kind `{kind_name}`")))?;

    let mut name = format!("{default_name}_{}", kind.name());
    let mut unique = false;
    let mut sparse = false;
    let mut metadata = MetaMap::new();

    for pair in args.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair
            .split_once(':')
            .ok_or_else(|| parse_err(format!("malformed index argument `{pair}`")))?;
        let (k, v) = (k.trim(), v.trim());
        match k {
            "name" => name = v.to_string(),
            "unique" => unique = v == "true",
            "sparse" => sparse = v == "true",
            _ => {
                metadata.insert(k.to_string(), parse_meta_value(v));
            }
        }
    }

    Ok(IndexDescriptor {
        name,
        kind,
        fields: fields.to_vec(),
        unique,
        sparse,
        metadata,
    })
}

fn parse_meta_value(v: &str) -> MetaValue {
    if v == "true" {
        MetaValue::Bool(true)
    } else if v == "false" {
        MetaValue::Bool(false)
    } else if let Ok(i) = v.parse::<i64>() {
        MetaValue::Int(i)
    } else {
        MetaValue::Text(v.to_string())
    }
}

fn import_block_index(entity_name: &str, value: &Value) -> Result<IndexDescriptor, InternalError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| parse_err(format!("entity {entity_name}: #Index entries must be mappings")))?;

    let get_str = |k: &str| map.get(Value::String(k.into())).and_then(Value::as_str);

    let kind_name = get_str("kind")
        .ok_or_else(|| parse_err(format!("entity {entity_name}: #Index entry missing `kind`")))?;
    let kind = IndexKind::parse(kind_name)
        .ok_or_else(|| parse_err(format!("entity {entity_name}: unknown index kind `{kind_name}`")))?;

    let fields = if kind == IndexKind::Graph {
        let from = get_str("from").ok_or_else(|| parse_err("graph index missing `from`"))?;
        let edge = get_str("edge").ok_or_else(|| parse_err("graph index missing `edge`"))?;
        let to = get_str("to").ok_or_else(|| parse_err("graph index missing `to`"))?;
        vec![from.to_string(), edge.to_string(), to.to_string()]
    } else {
        map.get(Value::String("fields".into()))
            .and_then(Value::as_sequence)
            .ok_or_else(|| parse_err(format!("entity {entity_name}: #Index entry missing `fields`")))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| parse_err("#Index `fields` entries must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let name = get_str("name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{entity_name}_{}", fields.join("_")));
    let unique = map
        .get(Value::String("unique".into()))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let sparse = map
        .get(Value::String("sparse".into()))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let reserved = ["kind", "from", "edge", "to", "fields", "name", "unique", "sparse"];
    let mut metadata = MetaMap::new();
    for (k, v) in map {
        let Some(k) = k.as_str() else { continue };
        if reserved.contains(&k) {
            continue;
        }
        let meta_value = match v {
            Value::Bool(b) => MetaValue::Bool(*b),
            Value::Number(n) => MetaValue::Int(n.as_i64().unwrap_or_default()),
            Value::String(s) => MetaValue::Text(s.clone()),
            _ => continue,
        };
        metadata.insert(k.to_string(), meta_value);
    }

    Ok(IndexDescriptor {
        name,
        kind,
        fields,
        unique,
        sparse,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PrimaryKeyDef;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let mut user = Entity::new("User", PrimaryKeyDef::single("id"));
        user.directory.push(DirectoryComponent::Static("users".into()));
        user.directory
            .push(DirectoryComponent::Dynamic("tenant".into()));
        user.fields
            .fields
            .push(FieldSchema::new("id", 0, PrimitiveType::Uuid));
        user.fields
            .fields
            .push(FieldSchema::new("tenant", 1, PrimitiveType::String));
        let mut email = FieldSchema::new("email", 2, PrimitiveType::String);
        email.is_optional = true;
        user.fields.fields.push(email);
        user.indexes.push(
            IndexDescriptor::new("email_idx", IndexKind::Scalar, vec!["email".into()])
                .with_unique(true)
                .with_sparse(true),
        );
        catalog.register(user).unwrap();
        catalog
    }

    #[test]
    fn round_trips_entity_with_optional_field_and_inline_index() {
        let catalog = sample_catalog();
        let text = export_catalog(&catalog).unwrap();
        let parsed = import_catalog(&text).unwrap();

        let original = catalog.entity("User").unwrap();
        let round_tripped = parsed.entity("User").unwrap();

        assert_eq!(original.type_name, round_tripped.type_name);
        assert_eq!(original.primary_key.fields, round_tripped.primary_key.fields);
        assert_eq!(original.directory, round_tripped.directory);
        assert_eq!(original.fields.fields.len(), round_tripped.fields.fields.len());
        for (a, b) in original.fields.fields.iter().zip(round_tripped.fields.fields.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.field_number, b.field_number);
            assert_eq!(a.ty, b.ty);
            assert_eq!(a.is_optional, b.is_optional);
            assert_eq!(a.is_array, b.is_array);
        }
        assert_eq!(original.indexes.len(), round_tripped.indexes.len());
        let oi = &original.indexes[0];
        let ri = &round_tripped.indexes[0];
        assert_eq!(oi.kind, ri.kind);
        assert_eq!(oi.fields, ri.fields);
        assert_eq!(oi.unique, ri.unique);
        assert_eq!(oi.sparse, ri.sparse);
    }

    #[test]
    fn parses_nested_optional_array_type() {
        let (field, _) = parse_field_line("tags", "optional<array<string>>", 0).unwrap();
        assert!(field.is_optional);
        assert!(field.is_array);
        assert_eq!(field.ty, PrimitiveType::String);
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        let err = parse_field_line("tags", "optional<array<string>", 0).unwrap_err();
        assert_eq!(err.class, ErrorClass::ParseError);
    }

    #[test]
    fn block_graph_index_round_trips() {
        let mut catalog = Catalog::new();
        let mut node = Entity::new("Edge", PrimaryKeyDef::single("id"));
        node.fields
            .fields
            .push(FieldSchema::new("id", 0, PrimitiveType::Uuid));
        node.fields
            .fields
            .push(FieldSchema::new("src", 1, PrimitiveType::String));
        node.fields
            .fields
            .push(FieldSchema::new("rel", 2, PrimitiveType::String));
        node.fields
            .fields
            .push(FieldSchema::new("dst", 3, PrimitiveType::String));
        node.indexes.push(
            IndexDescriptor::new(
                "adjacency",
                IndexKind::Graph,
                vec!["src".into(), "rel".into(), "dst".into()],
            )
            .with_meta("strategy", MetaValue::Text("adjacency".into())),
        );
        catalog.register(node).unwrap();

        let text = export_catalog(&catalog).unwrap();
        let parsed = import_catalog(&text).unwrap();
        let round_tripped = parsed.entity("Edge").unwrap();
        assert_eq!(round_tripped.indexes.len(), 1);
        assert_eq!(round_tripped.indexes[0].kind, IndexKind::Graph);
        assert_eq!(
            round_tripped.indexes[0].fields,
            vec!["src".to_string(), "rel".to_string(), "dst".to_string()]
        );
        assert_eq!(
            round_tripped.indexes[0].meta_str("strategy"),
            Some("adjacency")
        );
    }
}
