// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::borrow::Cow;

use url::Url;

pub trait Route {
    fn route() -> &'static str;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed(Self::route())
    }

    /// Resolve the route against the scheme and host of `base`
    fn absolute_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_path(&self.path());
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

pub trait SimpleRoute {
    const PATH: &'static str;
}

impl<T: SimpleRoute> Route for T {
    fn route() -> &'static str {
        Self::PATH
    }
}
