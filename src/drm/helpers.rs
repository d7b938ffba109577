//! Stateless helpers shared by the device and the registry.

use super::error::DrmError;
use super::kernel::KmsCard;
use super::types::{ObjectType, PropertyDescriptor};

// =============================================================================
// Property Lookup
// =============================================================================

/// Finds a property by name on an object and returns it with its current value.
///
/// Properties whose metadata cannot be read are skipped; they can't match anyway.
pub fn get_property(
    card: &(impl KmsCard + ?Sized),
    object_id: u32,
    ty: ObjectType,
    name: &str,
) -> Result<PropertyDescriptor, DrmError> {
    let props = card
        .object_properties(object_id, ty)
        .map_err(|source| DrmError::PropertyQueryFailed {
            object: object_id,
            source,
        })?;

    for (prop, value) in props {
        let info = match card.property_info(prop) {
            Ok(info) => info,
            Err(err) => {
                debug!("error getting property {prop} of {ty} {object_id}: {err:?}");
                continue;
            }
        };

        if info.name == name {
            return Ok(PropertyDescriptor {
                object_id,
                id: prop,
                name: info.name,
                kind: info.kind,
                immutable: info.immutable,
                atomic: info.atomic,
                value,
            });
        }
    }

    Err(DrmError::PropertyNotFound {
        object: object_id,
        name: name.to_owned(),
    })
}

// =============================================================================
// Device Probing
// =============================================================================

/// Whether the card exposes at least one CRTC, connector and encoder.
pub fn has_kms_resources(card: &impl KmsCard) -> bool {
    match card.resources() {
        Ok(res) => {
            !res.crtcs.is_empty() && !res.connectors.is_empty() && !res.encoders.is_empty()
        }
        Err(err) => {
            debug!("error getting resources: {err:?}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drm::testing::{scenario_a, FakeCard};
    use crate::drm::types::PropertyKind;

    #[test]
    fn finds_present_property() {
        let card = scenario_a().property(40, ObjectType::Connector, "DPMS", 3);

        let prop = get_property(&card, 40, ObjectType::Connector, "DPMS").unwrap();
        assert_eq!(prop.object_id, 40);
        assert_eq!(prop.name, "DPMS");
        assert_eq!(prop.value, 3);
        assert_eq!(prop.kind, PropertyKind::Range);
    }

    #[test]
    fn absent_property_is_not_found() {
        let card = scenario_a();

        let err = get_property(&card, 40, ObjectType::Connector, "DPMS").unwrap_err();
        assert!(matches!(
            err,
            DrmError::PropertyNotFound { object: 40, ref name } if name == "DPMS"
        ));

        // Same name on a different object doesn't leak across.
        let card = card.property(41, ObjectType::Connector, "DPMS", 0);
        assert!(get_property(&card, 40, ObjectType::Connector, "DPMS").is_err());
        assert!(get_property(&card, 41, ObjectType::Connector, "DPMS").is_ok());
    }

    #[test]
    fn object_type_is_part_of_the_lookup() {
        let card = scenario_a();

        assert!(get_property(&card, 20, ObjectType::Crtc, "ACTIVE").is_ok());
        assert!(matches!(
            get_property(&card, 20, ObjectType::Plane, "ACTIVE"),
            Err(DrmError::PropertyQueryFailed { object: 20, .. })
        ));
    }

    #[test]
    fn unknown_object_fails_the_query() {
        let card = scenario_a();
        assert!(matches!(
            get_property(&card, 999, ObjectType::Connector, "CRTC_ID"),
            Err(DrmError::PropertyQueryFailed { object: 999, .. })
        ));
    }

    #[test]
    fn kms_probe() {
        assert!(has_kms_resources(&scenario_a()));
        assert!(!has_kms_resources(&FakeCard::new()));
        assert!(!has_kms_resources(&FakeCard::new().crtc(20).encoder(30, None, 0b1)));
    }
}
