//! Modal visibility, and an edit store bound to a modal

use super::cell::StateCell;
use super::edit::{EditOptions, EditResource};
use super::token::Settled;
use crate::gateway::{Params, RequestError, RequestGateway};
use crate::registry::{Injectable, InjectionKey, EDIT_MODAL_STORE_KEY, MODAL_STORE_KEY};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Whether a dialog is open, and what it was opened with
#[derive(Debug)]
pub struct ModalState<P = Params, I = Params> {
    pub visible: StateCell<bool>,
    pub params: StateCell<Option<P>>,
    pub initial_params: StateCell<I>,
}

impl<P, I: Default> Default for ModalState<P, I> {
    fn default() -> Self {
        Self::new(I::default())
    }
}

impl<P, I> ModalState<P, I> {
    pub fn new(initial_params: I) -> Self {
        Self {
            visible: StateCell::new(false),
            params: StateCell::new(None),
            initial_params: StateCell::new(initial_params),
        }
    }

    pub fn open(&self, params: Option<P>) {
        self.params.set(params);
        self.visible.set(true);
    }

    pub fn close(&self) {
        self.visible.set(false);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.with(|v| *v)
    }
}

impl<P, I> Injectable for Arc<ModalState<P, I>> {
    fn injection_key(&self) -> Option<InjectionKey> {
        Some(MODAL_STORE_KEY)
    }
}

/// An [`EditResource`] whose begin actions open a modal and whose settled
/// submit closes it
pub struct EditModalResource<F, I = Params> {
    edit: EditResource<F, I>,
    modal: Arc<ModalState>,
}

impl<F, I> Clone for EditModalResource<F, I> {
    fn clone(&self) -> Self {
        Self {
            edit: self.edit.clone(),
            modal: Arc::clone(&self.modal),
        }
    }
}

impl<F, I> EditModalResource<F, I>
where
    F: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static,
    I: Clone + Default + Send + Sync + 'static,
{
    pub fn new(gateway: RequestGateway, options: EditOptions<F, I>) -> Self {
        let modal = Arc::new(ModalState::default());

        let on_open = Arc::clone(&modal);
        let on_submit = Arc::clone(&modal);
        let options = options
            .wrap_pre_action(move || on_open.open(None))
            .wrap_post_submit(move |_| on_submit.close());

        Self {
            edit: EditResource::new(gateway, options),
            modal,
        }
    }

    pub fn edit(&self) -> &EditResource<F, I> {
        &self.edit
    }

    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    pub fn visible(&self) -> bool {
        self.modal.is_visible()
    }

    pub async fn begin_add(&self, action_params: Option<Params>) -> Settled {
        self.edit.begin_add(action_params).await
    }

    pub async fn begin_edit(&self, action_params: Params) -> Settled {
        self.edit.begin_edit(action_params).await
    }

    pub async fn submit(&self) -> Result<Settled, RequestError> {
        self.edit.submit().await
    }

    /// Close without submitting
    pub fn cancel(&self) {
        self.modal.close();
    }
}

impl<F, I> Injectable for EditModalResource<F, I> {
    fn injection_key(&self) -> Option<InjectionKey> {
        Some(EDIT_MODAL_STORE_KEY)
    }
}
