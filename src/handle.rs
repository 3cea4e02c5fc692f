//! Registry of native handles with parent/child ownership

use std::sync::{Arc, Weak};
use libc::c_void;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Error, Result, oci::{self, Oci, Ptr, OCIEnv, OCIStruct}};

/// Kinds of native handles tracked by [`HandleRef`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Error,
    SvcCtx,
    Stmt,
    Bind,
    Server,
    Session,
}

impl HandleKind {
    /// OCI handle type passed to `OCIHandleAlloc` and `OCIHandleFree`
    pub fn htype(self) -> u32 {
        match self {
            HandleKind::Error   => oci::OCI_HTYPE_ERROR,
            HandleKind::SvcCtx  => oci::OCI_HTYPE_SVCCTX,
            HandleKind::Stmt    => oci::OCI_HTYPE_STMT,
            HandleKind::Bind    => oci::OCI_HTYPE_BIND,
            HandleKind::Server  => oci::OCI_HTYPE_SERVER,
            HandleKind::Session => oci::OCI_HTYPE_SESSION,
        }
    }
}

enum Ownership {
    /// The node frees the handle when it is released
    Owned(Arc<dyn Oci>),
    /// The handle belongs to someone else; the node only points at it
    Alias,
}

struct Node {
    ptr: Ptr<c_void>,
    kind: HandleKind,
    released: bool,
    ownership: Ownership,
    parent: Weak<Mutex<Node>>,
    children: Vec<HandleRef>,
}

impl Node {
    fn free(&mut self) -> Result<()> {
        let ptr = self.ptr.take();
        match &self.ownership {
            Ownership::Owned(oci) if !ptr.is_null() => {
                let res = oci.handle_free(ptr.get(), self.kind.htype());
                if res == oci::OCI_SUCCESS {
                    Ok(())
                } else {
                    Err(Error::Interface(format!("cannot free {:?} handle: OCIHandleFree returned {}", self.kind, res)))
                }
            }
            _ => Ok(()),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        for child in self.children.drain(..).rev() {
            if let Err(err) = child.release() {
                warn!(%err, "child handle was not freed");
            }
        }
        if !self.released {
            self.released = true;
            if let Err(err) = self.free() {
                warn!(%err, "handle was not freed");
            }
        }
    }
}

/**
    Reference-counted node that tracks one native handle.

    A node either owns its handle, and frees it with `OCIHandleFree` when released,
    or aliases a handle owned elsewhere. Nodes can be linked into a parent/child tree;
    releasing a parent releases all of its children first.
*/
#[derive(Clone)]
pub struct HandleRef {
    node: Arc<Mutex<Node>>,
}

impl std::fmt::Debug for HandleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.node.lock();
        f.debug_struct("HandleRef")
            .field("kind", &node.kind)
            .field("ptr", &node.ptr)
            .field("released", &node.released)
            .field("children", &node.children.len())
            .finish()
    }
}

impl HandleRef {
    fn new(kind: HandleKind, ptr: Ptr<c_void>, ownership: Ownership, released: bool) -> Self {
        let node = Node { ptr, kind, released, ownership, parent: Weak::new(), children: Vec::new() };
        Self { node: Arc::new(Mutex::new(node)) }
    }

    /// Takes ownership of an already allocated handle.
    pub fn owned(oci: Arc<dyn Oci>, kind: HandleKind, ptr: Ptr<c_void>, parent: Option<&HandleRef>) -> Self {
        let handle = Self::new(kind, ptr, Ownership::Owned(oci), false);
        if let Some(parent) = parent {
            parent.link_child(&handle);
        }
        handle
    }

    /// Allocates a new handle of the specified kind in the environment.
    pub fn alloc(oci: Arc<dyn Oci>, env: Ptr<OCIEnv>, kind: HandleKind, parent: Option<&HandleRef>) -> Result<Self> {
        let ptr = alloc_handle(oci.as_ref(), env, kind)?;
        Ok(Self::owned(oci, kind, ptr, parent))
    }

    /// Creates an alias that does not point to any handle yet.
    pub fn alias(kind: HandleKind) -> Self {
        Self::new(kind, Ptr::null(), Ownership::Alias, true)
    }

    /// Points an alias at a handle. The alias becomes live again if it was released.
    pub fn set<T: OCIStruct>(&self, ptr: Ptr<T>) {
        let mut node = self.node.lock();
        if let Ownership::Alias = node.ownership {
            node.ptr = Ptr::from_void(ptr.as_void());
            node.released = ptr.is_null();
        }
    }

    /// Returns the handle pointer. It is NULL once the node is released.
    pub fn ptr<T: OCIStruct>(&self) -> Ptr<T> {
        Ptr::from_void(self.node.lock().ptr.as_void())
    }

    /// Returns the handle kind, or `None` once the node is released.
    pub fn kind(&self) -> Option<HandleKind> {
        let node = self.node.lock();
        if node.released { None } else { Some(node.kind) }
    }

    pub fn is_released(&self) -> bool {
        self.node.lock().released
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.node.lock().ownership, Ownership::Owned(_))
    }

    pub fn child_count(&self) -> usize {
        self.node.lock().children.len()
    }

    /// Registers `child` as owned by this node.
    pub fn link_child(&self, child: &HandleRef) {
        child.node.lock().parent = Arc::downgrade(&self.node);
        self.node.lock().children.push(child.clone());
    }

    /**
        Releases every child of this node, last registered first. The node itself
        stays live.

        All children are released even when some of them fail. The first failure
        is returned.
    */
    pub fn release_children(&self) -> Result<()> {
        let children = std::mem::take(&mut self.node.lock().children);
        let mut first_err = None;
        for child in children.into_iter().rev() {
            if let Err(err) = child.release() {
                warn!(%err, "child handle was not freed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /**
        Releases this node: children first, then the node is unlinked from its
        parent and, if it owns its handle, the handle is freed.

        Releasing an already released node does nothing.
    */
    pub fn release(&self) -> Result<()> {
        let parent = {
            let mut node = self.node.lock();
            if node.released {
                return Ok(());
            }
            node.released = true;
            std::mem::take(&mut node.parent)
        };
        let children_res = self.release_children();
        if let Some(parent) = parent.upgrade() {
            parent.lock().children.retain(|child| !Arc::ptr_eq(&child.node, &self.node));
        }
        let res = self.node.lock().free();
        if let Err(err) = &res {
            warn!(%err, "handle was not freed");
        }
        debug!(kind = ?self.node.lock().kind, "handle released");
        children_res.and(res)
    }
}

/// Allocates a handle with `OCIHandleAlloc`.
pub(crate) fn alloc_handle(oci: &dyn Oci, env: Ptr<OCIEnv>, kind: HandleKind) -> Result<Ptr<c_void>> {
    let mut hndl = std::ptr::null_mut::<c_void>();
    let res = oci.handle_alloc(env, &mut hndl, kind.htype());
    if res != oci::OCI_SUCCESS {
        return Err(Error::env(oci, env, res));
    }
    if hndl.is_null() {
        Err(Error::Interface(format!("OCI returned NULL for {:?} handle", kind)))
    } else {
        Ok(Ptr::new(hndl))
    }
}

/// Frees a handle with `OCIHandleFree`, logging failures.
pub(crate) fn free_handle<T: OCIStruct>(oci: &dyn Oci, ptr: Ptr<T>, kind: HandleKind) -> Result<()> {
    if ptr.is_null() {
        return Ok(());
    }
    let res = oci.handle_free(ptr.as_void(), kind.htype());
    if res == oci::OCI_SUCCESS {
        Ok(())
    } else {
        let err = Error::Interface(format!("cannot free {:?} handle: OCIHandleFree returned {}", kind, res));
        warn!(%err, "handle was not freed");
        Err(err)
    }
}
