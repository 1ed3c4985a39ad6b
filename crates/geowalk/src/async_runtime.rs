//! Async runtime abstraction for native and WASM platforms.
//!
//! The geocoding and elevation lookups need somewhere to run their futures:
//! a Tokio runtime on native (reqwest requires one), Bevy's task pool on WASM
//! (where reqwest rides the browser's fetch). [`TaskSpawner`] hides the
//! difference so callers never `#[cfg]` on the platform.

use bevy::prelude::*;

/// Plugin that sets up the async runtime for the current platform.
pub struct AsyncRuntimePlugin;

impl Plugin for AsyncRuntimePlugin {
    fn build(&self, app: &mut App) {
        #[cfg(target_family = "wasm")]
        let _ = app;

        #[cfg(not(target_family = "wasm"))]
        app.add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default());
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;

    /// System parameter for spawning background futures.
    ///
    /// Results come back over channels (`async_channel`) polled from regular
    /// systems; the future itself returns nothing.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        runtime: Res<'w, bevy_tokio_tasks::TokioTasksRuntime>,
        // Matches the WASM signature.
        #[allow(dead_code)]
        _local: Local<'s, ()>,
    }

    impl TaskSpawner<'_, '_> {
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.runtime.spawn_background_task(move |_ctx| future);
        }
    }
}

#[cfg(target_family = "wasm")]
mod wasm {
    use std::future::Future;

    use bevy::ecs::system::SystemParam;
    use bevy::prelude::*;
    use bevy::tasks::AsyncComputeTaskPool;

    /// System parameter for spawning background futures.
    ///
    /// On WASM the browser is single-threaded, so no `Send` bound is needed.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        #[allow(dead_code)]
        _local: Local<'s, ()>,
        #[allow(dead_code)]
        _marker: std::marker::PhantomData<&'w ()>,
    }

    impl TaskSpawner<'_, '_> {
        pub fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + 'static,
        {
            AsyncComputeTaskPool::get().spawn_local(future).detach();
        }
    }
}

#[cfg(not(target_family = "wasm"))]
pub use native::TaskSpawner;
#[cfg(target_family = "wasm")]
pub use wasm::TaskSpawner;
