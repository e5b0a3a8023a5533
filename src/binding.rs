//! Injection of fixtures into test instances.
//!
//! A test instance lists its injectable fields as [`Slot`]s through the [`TestInstance`] trait.
//! Each slot pairs a [`SlotKind`] (what to inject) with a [`SlotTarget`] (where to put it).
//! The [`MetadataBinder`] resolves every empty slot, and leaves populated ones alone.
use crate::declaration::{ResourceDeclaration, ResponseDeclaration};
use crate::error::{ServerLifecycleError, TestbedError};
use crate::resources::{ResourceStream, Resources};
use crate::{ResponseDescriptor, ServerHandle};
use log::{debug, warn};

/// A test fixture whose fields can be populated by the [`MetadataBinder`].
///
/// ```rust
/// use webserver_testbed::{
///     ResourceDeclaration, ResponseDeclaration, ResponseDescriptor, ServerHandle, Slot,
///     TestInstance,
/// };
///
/// #[derive(Default)]
/// struct UserApiTest {
///     server: Option<ServerHandle>,
///     not_found: Option<ResponseDescriptor>,
///     expected_user: Option<String>,
/// }
///
/// impl TestInstance for UserApiTest {
///     fn slots(&mut self) -> Vec<Slot<'_>> {
///         vec![
///             Slot::server("server", &mut self.server),
///             Slot::response(
///                 "not_found",
///                 ResponseDeclaration::single("not_found.json").status_code(404),
///                 &mut self.not_found,
///             ),
///             Slot::resource(
///                 "expected_user",
///                 ResourceDeclaration::new("users/alice.json"),
///                 &mut self.expected_user,
///             ),
///         ]
///     }
/// }
/// ```
pub trait TestInstance {
    /// The injectable fields of the instance, in a stable order.
    fn slots(&mut self) -> Vec<Slot<'_>>;
}

/// For tests that declare no slots.
impl TestInstance for () {
    fn slots(&mut self) -> Vec<Slot<'_>> {
        Vec::new()
    }
}

/// What gets injected into a [`Slot`].
#[derive(Debug, Clone)]
pub enum SlotKind {
    /// The handle of the current mock web server.
    Server,
    /// A response built from a single-value declaration.
    Response(ResponseDeclaration),
    /// A resource from the bundled resource set, decoded according to the target type.
    Resource(ResourceDeclaration),
}

impl SlotKind {
    fn describe(&self) -> &'static str {
        match self {
            SlotKind::Server => "a server handle",
            SlotKind::Response(_) => "a response",
            SlotKind::Resource(_) => "a resource",
        }
    }

    fn accepts(&self, target_type: TargetType) -> bool {
        matches!(
            (self, target_type),
            (SlotKind::Server, TargetType::ServerHandle)
                | (SlotKind::Response(_), TargetType::Response)
                | (
                    SlotKind::Resource(_),
                    TargetType::Text | TargetType::Bytes | TargetType::Stream
                )
        )
    }
}

/// The shape of value a [`SlotTarget`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    ServerHandle,
    Response,
    Text,
    Bytes,
    Stream,
}

/// A resolved value, ready to be stored in a [`SlotTarget`].
#[derive(Debug)]
pub enum BoundValue {
    Server(ServerHandle),
    Response(ResponseDescriptor),
    Text(String),
    Bytes(Vec<u8>),
    Stream(ResourceStream),
}

/// A location able to receive a [`BoundValue`], typically an `Option` field of a test
/// instance where `None` means "not populated yet".
pub trait SlotTarget {
    fn target_type(&self) -> TargetType;

    fn is_populated(&self) -> bool;

    /// Store `value`, handing it back if it does not fit.
    fn populate(&mut self, value: BoundValue) -> Result<(), BoundValue>;

    /// Used in error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! option_slot_target {
    ($ty:ty, $target:ident, $variant:ident) => {
        impl SlotTarget for Option<$ty> {
            fn target_type(&self) -> TargetType {
                TargetType::$target
            }

            fn is_populated(&self) -> bool {
                self.is_some()
            }

            fn populate(&mut self, value: BoundValue) -> Result<(), BoundValue> {
                match value {
                    BoundValue::$variant(value) => {
                        *self = Some(value);
                        Ok(())
                    }
                    other => Err(other),
                }
            }
        }
    };
}

/// A handle to a server that has since stopped counts as empty: it is replaced by the handle of
/// the current server on the next bind.
impl SlotTarget for Option<ServerHandle> {
    fn target_type(&self) -> TargetType {
        TargetType::ServerHandle
    }

    fn is_populated(&self) -> bool {
        matches!(self, Some(server) if server.is_running())
    }

    fn populate(&mut self, value: BoundValue) -> Result<(), BoundValue> {
        match value {
            BoundValue::Server(server) => {
                *self = Some(server);
                Ok(())
            }
            other => Err(other),
        }
    }
}

option_slot_target!(ResponseDescriptor, Response, Response);
option_slot_target!(String, Text, Text);
option_slot_target!(Vec<u8>, Bytes, Bytes);
option_slot_target!(ResourceStream, Stream, Stream);

/// A named, injectable field of a [`TestInstance`].
pub struct Slot<'a> {
    name: &'static str,
    kind: SlotKind,
    target: &'a mut dyn SlotTarget,
}

impl<'a> Slot<'a> {
    pub fn new(name: &'static str, kind: SlotKind, target: &'a mut dyn SlotTarget) -> Self {
        Self { name, kind, target }
    }

    /// Inject the handle of the current mock web server.
    pub fn server(name: &'static str, target: &'a mut dyn SlotTarget) -> Self {
        Self::new(name, SlotKind::Server, target)
    }

    /// Inject the response built from `declaration`, which must carry exactly one value.
    pub fn response(
        name: &'static str,
        declaration: ResponseDeclaration,
        target: &'a mut dyn SlotTarget,
    ) -> Self {
        Self::new(name, SlotKind::Response(declaration), target)
    }

    /// Inject the resource named by `declaration`.
    pub fn resource(
        name: &'static str,
        declaration: ResourceDeclaration,
        target: &'a mut dyn SlotTarget,
    ) -> Self {
        Self::new(name, SlotKind::Resource(declaration), target)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &SlotKind {
        &self.kind
    }

    fn unsupported(&self) -> TestbedError {
        TestbedError::UnsupportedBinding {
            slot: self.name.to_owned(),
            type_name: self.target.type_name(),
            kind: self.kind.describe(),
        }
    }
}

/// Resolves the slots of a [`TestInstance`] and populates the empty ones.
pub struct MetadataBinder<'a> {
    server: Option<&'a ServerHandle>,
    resources: &'a Resources,
}

impl<'a> MetadataBinder<'a> {
    /// `server` is `None` when no mock web server is running yet, e.g. when an instance is
    /// post-processed before a per-test server starts: empty server slots are then left
    /// empty, to be filled by a later bind.
    pub fn new(server: Option<&'a ServerHandle>, resources: &'a Resources) -> Self {
        Self { server, resources }
    }

    /// Check every slot of `instance` without loading anything and without a server.
    ///
    /// Catches mistakes in the fixture itself: slots whose type cannot hold what was declared,
    /// malformed declarations.
    pub fn validate<I>(&self, instance: &mut I) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
    {
        self.check(&instance.slots())
    }

    /// Populate every empty slot of `instance`, in the order the slots are declared.
    ///
    /// Populated slots are skipped, so binding the same instance twice is a no-op.
    /// All slots are validated before anything is loaded: an error leaves the instance
    /// untouched unless a resource fails to load halfway through.
    pub fn bind<I>(&self, instance: &mut I) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
    {
        let slots = instance.slots();
        self.check(&slots)?;

        for slot in slots {
            if slot.target.is_populated() {
                debug!("Slot `{}` is already populated, skipping it.", slot.name);
                continue;
            }
            if matches!(slot.kind, SlotKind::Server) && self.server.is_none() {
                debug!(
                    "No mock web server is running yet, leaving slot `{}` empty.",
                    slot.name
                );
                continue;
            }
            let value = self.resolve(&slot)?;
            slot.target.populate(value).map_err(|_| slot.unsupported())?;
            debug!("Bound {} to slot `{}`.", slot.kind.describe(), slot.name);
        }
        Ok(())
    }

    fn check(&self, slots: &[Slot<'_>]) -> Result<(), TestbedError> {
        let mut server_slots = 0;
        for slot in slots {
            if !slot.kind.accepts(slot.target.target_type()) {
                return Err(slot.unsupported());
            }
            match &slot.kind {
                SlotKind::Server => server_slots += 1,
                SlotKind::Response(declaration) => {
                    if declaration.values().len() != 1 {
                        return Err(TestbedError::InvalidDeclaration {
                            slot: slot.name.to_owned(),
                            reason: format!(
                                "a response slot takes exactly one value, {} were declared",
                                declaration.values().len()
                            ),
                        });
                    }
                    declaration.resolved_status()?;
                }
                SlotKind::Resource(_) => {}
            }
        }
        if server_slots > 1 {
            warn!(
                "There is no reason to inject the mock web server more than once ({} slots).",
                server_slots
            );
        }
        Ok(())
    }

    fn resolve(&self, slot: &Slot<'_>) -> Result<BoundValue, TestbedError> {
        let value = match &slot.kind {
            SlotKind::Server => {
                let server = self.server.ok_or(ServerLifecycleError::NotRunning)?;
                BoundValue::Server(server.clone())
            }
            SlotKind::Response(declaration) => {
                let response = declaration
                    .build_all(self.resources)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| TestbedError::InvalidDeclaration {
                        slot: slot.name.to_owned(),
                        reason: "no value was declared".to_string(),
                    })?;
                BoundValue::Response(response)
            }
            SlotKind::Resource(declaration) => {
                let reference = declaration.reference();
                match slot.target.target_type() {
                    TargetType::Text => BoundValue::Text(self.resources.read_as_text(reference)?),
                    TargetType::Bytes => {
                        BoundValue::Bytes(self.resources.read_as_bytes(reference)?)
                    }
                    TargetType::Stream => {
                        BoundValue::Stream(self.resources.read_as_stream(reference)?)
                    }
                    TargetType::ServerHandle | TargetType::Response => {
                        return Err(slot.unsupported())
                    }
                }
            }
        };
        Ok(value)
    }
}
