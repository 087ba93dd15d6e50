//! Guest sign-in: mints a fresh user id, seeds its wallet, and issues
//! a bearer JWT. There is no password or email in this domain — every
//! session starts as an anonymous guest.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::wallet::WalletRepo;

const TOKEN_TTL_HOURS: i64 = 24 * 30;

/// JWT claims: subject is the guest's user id as a string.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// `POST /auth/guest` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuestSignInResponse {
    pub user_id: u64,
    pub token: String,
    pub balance_avail: i64,
}

pub struct UserAuthService {
    wallet: Arc<dyn WalletRepo>,
    jwt_secret: String,
}

impl UserAuthService {
    pub fn new(wallet: Arc<dyn WalletRepo>, jwt_secret: String) -> Self {
        Self { wallet, jwt_secret }
    }

    /// Creates a new guest user, opens its wallet at a zero balance,
    /// and returns a signed JWT for it. Guest ids are drawn from the
    /// full `u64` space at random rather than issued sequentially:
    /// there is no durable identity registry to check against, so a
    /// counter would risk reusing an id across restarts.
    pub async fn guest_sign_in(&self) -> Result<GuestSignInResponse> {
        let user_id: u64 = rand::thread_rng().gen_range(1..=u64::MAX / 2);

        // Touch the wallet row so the user exists before the client's
        // first quickPlay call reads it.
        let mut tx = self.wallet.begin().await.context("open wallet tx")?;
        let wallet = tx.get_for_update(user_id).await.context("seed wallet row")?;
        tx.commit().await.context("commit wallet seed")?;

        let token = self.sign(user_id)?;
        Ok(GuestSignInResponse { user_id, token, balance_avail: wallet.balance_avail })
    }

    fn sign(&self, user_id: u64) -> Result<String> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
            .expect("valid timestamp");
        let claims = Claims { sub: user_id.to_string(), exp: exp.timestamp() as usize, iat: now.timestamp() as usize };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.jwt_secret.as_bytes())).context("sign jwt")
    }

    /// Verify a bearer token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}
