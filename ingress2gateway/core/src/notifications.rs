use crate::ObjectRef;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationType {
    Info,
    Warning,
    Error,
}

/// A message for the user about how their resources were converted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationType,
    pub message: String,
    pub objects: Vec<ObjectRef>,
}

/// Collects notifications raised while converting resources.
///
/// Every notification is also emitted as a `tracing` event at the matching
/// level.
#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

// === impl NotificationType ===

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

// === impl Notification ===

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if !self.objects.is_empty() {
            f.write_str(" (")?;
            for (i, object) in self.objects.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{object}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

// === impl Notifications ===

impl Notifications {
    pub fn info(&mut self, message: impl Into<String>, objects: impl IntoIterator<Item = ObjectRef>) {
        self.dispatch(NotificationType::Info, message.into(), objects);
    }

    pub fn warn(&mut self, message: impl Into<String>, objects: impl IntoIterator<Item = ObjectRef>) {
        self.dispatch(NotificationType::Warning, message.into(), objects);
    }

    pub fn error(&mut self, message: impl Into<String>, objects: impl IntoIterator<Item = ObjectRef>) {
        self.dispatch(NotificationType::Error, message.into(), objects);
    }

    fn dispatch(
        &mut self,
        kind: NotificationType,
        message: String,
        objects: impl IntoIterator<Item = ObjectRef>,
    ) {
        let notification = Notification {
            kind,
            message,
            objects: objects.into_iter().collect(),
        };
        let objects = notification
            .objects
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match kind {
            NotificationType::Info => tracing::info!(%objects, "{}", notification.message),
            NotificationType::Warning => tracing::warn!(%objects, "{}", notification.message),
            NotificationType::Error => tracing::error!(%objects, "{}", notification.message),
        }
        self.items.push(notification);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: NotificationType) -> impl Iterator<Item = &Notification> + '_ {
        self.items.iter().filter(move |n| n.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Extend<Notification> for Notifications {
    fn extend<T: IntoIterator<Item = Notification>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl IntoIterator for Notifications {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_notifications_in_order() {
        let ingress = ObjectRef {
            kind: "Ingress".to_string(),
            namespace: Some("default".to_string()),
            name: "web".to_string(),
        };

        let mut notifications = Notifications::default();
        notifications.info("converted", None);
        notifications.warn("canary-by-cookie is not supported", Some(ingress.clone()));

        assert_eq!(notifications.len(), 2);
        let warnings = notifications
            .of_kind(NotificationType::Warning)
            .collect::<Vec<_>>();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].to_string(),
            "[WARNING] canary-by-cookie is not supported (Ingress default/web)"
        );
    }
}
