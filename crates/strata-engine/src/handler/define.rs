//! Adding, replacing and removing handlers on a defined class

use super::{build_order_map, find_handler, Handler, HandlerBuilder, HandlerKind};
use crate::class::ClassId;
use crate::env::Environment;
use crate::error::{ClassError, ClassResult};
use tracing::debug;

impl Environment {
    /// Attach a handler to a class
    ///
    /// A handler with the same name and kind is replaced unless it is busy.
    /// Returns the handler's position in the class's handler array.
    pub fn define_handler(&mut self, class: &str, builder: HandlerBuilder) -> ClassResult<usize> {
        if self.loaded_image.is_some() {
            return Err(ClassError::ImageActive);
        }
        let id = self.require_class(class)?;
        let existing = self.handler_position(id, &builder.name, builder.kind)?;
        if let Some(pos) = existing {
            if self.def(id)?.handlers[pos].busy > 0 {
                return Err(ClassError::HandlerInUse {
                    class: class.to_string(),
                    name: builder.name,
                });
            }
        }

        let handler = self.make_handler(id, &builder);
        let Some(def) = self.classes.get_mut(id) else {
            return Err(ClassError::UnknownClass(class.to_string()));
        };
        let pos = match existing {
            Some(pos) => {
                let old = std::mem::replace(&mut def.handlers[pos], handler);
                self.symbols.release(old.name);
                pos
            }
            None => {
                def.handlers.push(handler);
                def.handlers.len() - 1
            }
        };
        def.handler_order = build_order_map(&def.handlers, &self.symbols);

        debug!(
            class,
            handler = %builder.name,
            kind = %builder.kind,
            replaced = existing.is_some(),
            "handler defined"
        );
        Ok(pos)
    }

    /// Remove a handler from a class
    ///
    /// Built-in handlers cannot be removed.
    pub fn remove_handler(&mut self, class: &str, name: &str, kind: HandlerKind) -> ClassResult<()> {
        if self.loaded_image.is_some() {
            return Err(ClassError::ImageActive);
        }
        let id = self.require_class(class)?;
        let pos = self
            .handler_position(id, name, kind)?
            .ok_or_else(|| ClassError::UnknownHandler {
                class: class.to_string(),
                name: name.to_string(),
                kind: kind.as_str(),
            })?;
        let Some(def) = self.classes.get_mut(id) else {
            return Err(ClassError::UnknownClass(class.to_string()));
        };
        if def.handlers[pos].system {
            return Err(ClassError::SystemClass(class.to_string()));
        }
        if def.handlers[pos].busy > 0 {
            return Err(ClassError::HandlerInUse {
                class: class.to_string(),
                name: name.to_string(),
            });
        }
        let old = def.handlers.remove(pos);
        self.symbols.release(old.name);
        def.handler_order = build_order_map(&def.handlers, &self.symbols);
        debug!(class, handler = name, %kind, "handler removed");
        Ok(())
    }

    /// Locally defined handler by name and kind
    pub fn find_handler(&self, class: &str, name: &str, kind: HandlerKind) -> Option<&Handler> {
        let def = self.class_by_name(class)?;
        let pos = find_handler(&def.handlers, &def.handler_order, &self.symbols, name, kind)?;
        def.handlers.get(pos)
    }

    /// Mark a handler busy
    pub fn increment_handler_busy(
        &mut self,
        class: ClassId,
        name: &str,
        kind: HandlerKind,
    ) -> ClassResult<()> {
        let handler = self.handler_mut(class, name, kind)?;
        handler.busy += 1;
        Ok(())
    }

    /// Release one busy mark on a handler
    pub fn decrement_handler_busy(
        &mut self,
        class: ClassId,
        name: &str,
        kind: HandlerKind,
    ) -> ClassResult<()> {
        let handler = self.handler_mut(class, name, kind)?;
        handler.busy = handler.busy.saturating_sub(1);
        Ok(())
    }

    fn handler_position(
        &self,
        class: ClassId,
        name: &str,
        kind: HandlerKind,
    ) -> ClassResult<Option<usize>> {
        let def = self.def(class)?;
        Ok(find_handler(
            &def.handlers,
            &def.handler_order,
            &self.symbols,
            name,
            kind,
        ))
    }

    fn handler_mut(
        &mut self,
        class: ClassId,
        name: &str,
        kind: HandlerKind,
    ) -> ClassResult<&mut Handler> {
        let pos = self.handler_position(class, name, kind)?;
        let class_name = self.class_name(class).to_string();
        let def = self
            .classes
            .get_mut(class)
            .ok_or_else(|| ClassError::UnknownClass(class_name.clone()))?;
        pos.and_then(|p| def.handlers.get_mut(p))
            .ok_or_else(|| ClassError::UnknownHandler {
                class: class_name,
                name: name.to_string(),
                kind: kind.as_str(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    fn env_with_a() -> (Environment, ClassId) {
        let mut env = Environment::new();
        let a = env
            .define_class(ClassBuilder::new("A").handler(HandlerBuilder::new("print")))
            .unwrap();
        (env, a)
    }

    #[test]
    fn test_define_and_find() {
        let (mut env, _) = env_with_a();
        let pos = env
            .define_handler("A", HandlerBuilder::new("area").kind(HandlerKind::After))
            .unwrap();
        assert_eq!(pos, 1);
        let h = env.find_handler("A", "area", HandlerKind::After).unwrap();
        assert_eq!(h.kind(), HandlerKind::After);
        assert!(env.find_handler("A", "area", HandlerKind::Primary).is_none());
        assert_eq!(env.class_by_name("A").unwrap().handler_order(), &[1, 0]);
    }

    #[test]
    fn test_redefine_replaces_in_place() {
        let (mut env, _) = env_with_a();
        let pos = env
            .define_handler("A", HandlerBuilder::new("print").params(1, -1))
            .unwrap();
        assert_eq!(pos, 0);
        let def = env.class_by_name("A").unwrap();
        assert_eq!(def.handlers().len(), 1);
        assert_eq!(def.handlers()[0].max_params(), -1);
        assert_eq!(env.symbols().count(def.handlers()[0].name()), 1);
    }

    #[test]
    fn test_busy_handler_protected() {
        let (mut env, a) = env_with_a();
        env.increment_handler_busy(a, "print", HandlerKind::Primary)
            .unwrap();
        assert!(env.is_class_being_used(a));
        assert!(matches!(
            env.remove_handler("A", "print", HandlerKind::Primary),
            Err(ClassError::HandlerInUse { .. })
        ));
        env.decrement_handler_busy(a, "print", HandlerKind::Primary)
            .unwrap();
        env.remove_handler("A", "print", HandlerKind::Primary).unwrap();
        assert!(env.symbols().find("print").is_none());
    }

    #[test]
    fn test_remove_unknown_handler() {
        let (mut env, _) = env_with_a();
        assert_eq!(
            env.remove_handler("A", "print", HandlerKind::Around),
            Err(ClassError::UnknownHandler {
                class: "A".into(),
                name: "print".into(),
                kind: "around",
            })
        );
        assert!(matches!(
            env.define_handler("Nope", HandlerBuilder::new("x")),
            Err(ClassError::UnknownClass(_))
        ));
    }
}
