// Settable-field tables
// Maps field names to setter functions for one message type

use crate::error::FieldError;

/// Returned by a setter that cannot interpret the value it was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue;

pub type Setter<T> = fn(&mut T, &str) -> Result<(), InvalidValue>;

/// Static name -> setter table declared once per message type
pub struct FieldTable<T: 'static> {
    type_name: &'static str,
    setters: &'static [(&'static str, Setter<T>)],
}

impl<T> FieldTable<T> {
    pub const fn new(type_name: &'static str, setters: &'static [(&'static str, Setter<T>)]) -> Self {
        Self { type_name, setters }
    }

    pub fn set(&self, target: &mut T, field: &str, value: &str) -> Result<(), FieldError> {
        let (_, setter) = self
            .setters
            .iter()
            .find(|(name, _)| *name == field)
            .ok_or_else(|| FieldError::Unknown {
                field: field.to_string(),
                type_name: self.type_name,
            })?;

        setter(target, value).map_err(|InvalidValue| FieldError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            type_name: self.type_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        uuid: String,
        cpu: u32,
    }

    fn set_uuid(p: &mut Probe, v: &str) -> Result<(), InvalidValue> {
        p.uuid = v.to_string();
        Ok(())
    }

    fn set_cpu(p: &mut Probe, v: &str) -> Result<(), InvalidValue> {
        p.cpu = v.parse().map_err(|_| InvalidValue)?;
        Ok(())
    }

    static PROBE_FIELDS: FieldTable<Probe> =
        FieldTable::new("APIProbeMsg", &[("uuid", set_uuid), ("cpuNum", set_cpu)]);

    #[test]
    fn test_set_known_field() {
        let mut probe = Probe::default();
        PROBE_FIELDS.set(&mut probe, "uuid", "abc").unwrap();
        PROBE_FIELDS.set(&mut probe, "cpuNum", "4").unwrap();
        assert_eq!(probe.uuid, "abc");
        assert_eq!(probe.cpu, 4);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let mut probe = Probe::default();
        let err = PROBE_FIELDS.set(&mut probe, "memory", "1").unwrap_err();
        assert_eq!(
            err,
            FieldError::Unknown {
                field: "memory".to_string(),
                type_name: "APIProbeMsg"
            }
        );
    }

    #[test]
    fn test_invalid_value_is_error() {
        let mut probe = Probe::default();
        let err = PROBE_FIELDS.set(&mut probe, "cpuNum", "many").unwrap_err();
        assert!(matches!(err, FieldError::InvalidValue { .. }));
    }
}
