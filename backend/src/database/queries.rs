//! Database query functions (Data Access Objects).
//!
//! This module centralizes all direct database operations, providing reusable
//! functions for interacting with the database and abstracting the query logic
//! from higher-level services and API handlers.

use std::collections::HashMap;

use super::models::*;
use super::{now_rfc3339, Db};

type Result<T> = std::result::Result<T, sqlx::Error>;

// ---------------------------------------------------------------------------
// users

impl Db {
    pub async fn create_user(&self, user: &NewUser) -> Result<()> {
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO users (username, pass_hash, user_email, referrer_user_id, referrer_code,
                                total_storage_size, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.pass_hash)
        .bind(&user.user_email)
        .bind(&user.referrer_user_id)
        .bind(&user.referrer_code)
        .bind(user.total_storage_size)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn user_by_referral_code(&self, code: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT u.* FROM users u
             INNER JOIN referral_codes rc ON rc.user_id = u.username
             WHERE rc.code = ?",
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn update_password(&self, username: &str, pass_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET pass_hash = ?, updated_at = ? WHERE username = ?")
            .bind(pass_hash)
            .bind(now_rfc3339())
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_wallet(&self, username: &str, address: &str) -> Result<()> {
        sqlx::query("UPDATE users SET wallet_address = ?, updated_at = ? WHERE username = ?")
            .bind(address)
            .bind(now_rfc3339())
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_total_storage(&self, username: &str, size: i64) -> Result<()> {
        sqlx::query("UPDATE users SET total_storage_size = ?, updated_at = ? WHERE username = ?")
            .bind(size)
            .bind(now_rfc3339())
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(())
    }

}

// ---------------------------------------------------------------------------
// referral / KOL

impl Db {
    pub async fn referral_codes_for_user(&self, user_id: &str) -> Result<Vec<ReferralCode>> {
        sqlx::query_as::<_, ReferralCode>(
            "SELECT * FROM referral_codes WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    pub async fn count_referral_codes(&self, user_id: &str) -> Result<i64> {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM referral_codes WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(n)
    }

    pub async fn insert_referral_code(&self, user_id: &str, code: &str) -> Result<()> {
        sqlx::query("INSERT INTO referral_codes (user_id, code, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(code)
            .bind(now_rfc3339())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Accounts that registered through any of this user's referral codes.
    pub async fn referral_roster(
        &self,
        referrer: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>)> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE referrer_user_id = ?")
                .bind(referrer)
                .fetch_one(self.pool())
                .await?;

        let rows = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE referrer_user_id = ? ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(referrer)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok((total, rows))
    }

    pub async fn referral_reward_for(&self, referrer: &str, referee: &str) -> Result<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT reward FROM referral_rewards WHERE referrer_user_id = ? AND user_id = ?",
        )
        .bind(referrer)
        .bind(referee)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(r,)| r))
    }

    pub async fn kol_for_user(&self, user_id: &str) -> Result<Option<Kol>> {
        sqlx::query_as::<_, Kol>("SELECT * FROM kols WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn kol_level_conf(&self, level: i64) -> Result<Option<KolLevelConf>> {
        sqlx::query_as::<_, KolLevelConf>("SELECT * FROM kol_level_confs WHERE level = ?")
            .bind(level)
            .fetch_optional(self.pool())
            .await
    }

    /// Accounts that registered through one specific referral code.
    pub async fn count_users_by_referral_code(&self, code: &str) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE referrer_code = ?")
            .bind(code)
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    /// Devices bound by accounts that registered through the code.
    pub async fn count_devices_by_referral_code(&self, code: &str) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM device_infos d
             INNER JOIN users u ON u.username = d.user_id
             WHERE u.referrer_code = ? AND d.bind_status = 'binding'",
        )
        .bind(code)
        .fetch_one(self.pool())
        .await?;
        Ok(n)
    }

    /// Daily signups through a referral code inside `[from, to]` (RFC3339
    /// bounds, lexicographic comparison).
    pub async fn referral_user_daily_stat(
        &self,
        code: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<(String, i64)>> {
        sqlx::query_as(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) FROM users
             WHERE referrer_code = ? AND created_at >= ? AND created_at <= ?
             GROUP BY day ORDER BY day ASC",
        )
        .bind(code)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
    }

    /// Daily device binds by accounts referred through the code.
    pub async fn referral_node_daily_stat(
        &self,
        code: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<(String, i64)>> {
        sqlx::query_as(
            "SELECT substr(d.updated_at, 1, 10) AS day, COUNT(*) FROM device_infos d
             INNER JOIN users u ON u.username = d.user_id
             WHERE u.referrer_code = ? AND d.bind_status = 'binding'
               AND d.updated_at >= ? AND d.updated_at <= ?
             GROUP BY day ORDER BY day ASC",
        )
        .bind(code)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
    }

    /// Number of devices bound by accounts this user referred.
    pub async fn referred_device_count(&self, referrer: &str) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM device_infos d
             INNER JOIN users u ON u.username = d.user_id
             WHERE u.referrer_user_id = ? AND d.bind_status = 'binding'",
        )
        .bind(referrer)
        .fetch_one(self.pool())
        .await?;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// assets

impl Db {
    /// Records an asset for a user in the given areas. The quota is charged
    /// once, when the asset row is first created for this user.
    pub async fn add_asset(&self, asset: &NewAsset, areas: &[String]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT total_size FROM user_assets WHERE user_id = ? AND hash = ?")
                .bind(&asset.user_id)
                .bind(&asset.hash)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_none() {
            sqlx::query(
                "INSERT INTO user_assets (user_id, hash, cid, asset_name, asset_type, total_size,
                                          password, group_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&asset.user_id)
            .bind(&asset.hash)
            .bind(&asset.cid)
            .bind(&asset.asset_name)
            .bind(&asset.asset_type)
            .bind(asset.total_size)
            .bind(&asset.password)
            .bind(asset.group_id)
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE users SET used_storage_size = used_storage_size + ? WHERE username = ?",
            )
            .bind(asset.total_size)
            .bind(&asset.user_id)
            .execute(&mut *tx)
            .await?;
        }

        for area in areas {
            sqlx::query(
                "INSERT OR IGNORE INTO user_asset_areas (hash, user_id, area_id) VALUES (?, ?, ?)",
            )
            .bind(&asset.hash)
            .bind(&asset.user_id)
            .bind(area)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    pub async fn asset_by_hash(&self, hash: &str, user_id: &str) -> Result<Option<UserAsset>> {
        sqlx::query_as::<_, UserAsset>(
            "SELECT * FROM user_assets WHERE hash = ? AND user_id = ?",
        )
        .bind(hash)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn areas_holding(&self, hash: &str, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT area_id FROM user_asset_areas WHERE hash = ? AND user_id = ?",
        )
        .bind(hash)
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    /// Of `areas`, the ones where this user does not yet hold the asset.
    pub async fn areas_missing_asset(
        &self,
        hash: &str,
        user_id: &str,
        areas: &[String],
    ) -> Result<Vec<String>> {
        let held = self.areas_holding(hash, user_id).await?;
        Ok(areas
            .iter()
            .filter(|a| !held.contains(a))
            .cloned()
            .collect())
    }

    pub async fn asset_in_area(&self, hash: &str, user_id: &str, area_id: &str) -> Result<bool> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_asset_areas WHERE hash = ? AND user_id = ? AND area_id = ?",
        )
        .bind(hash)
        .bind(user_id)
        .bind(area_id)
        .fetch_one(self.pool())
        .await?;
        Ok(n > 0)
    }

    /// True when at most one user holds this asset in the area, i.e. removing
    /// it would drop the area's last copy.
    pub async fn is_only_holder(&self, hash: &str, area_id: &str) -> Result<bool> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id) FROM user_asset_areas WHERE hash = ? AND area_id = ?",
        )
        .bind(hash)
        .bind(area_id)
        .fetch_one(self.pool())
        .await?;
        Ok(n <= 1)
    }

    /// Every area where any user holds the asset, for replica aggregation.
    pub async fn areas_with_asset(&self, hash: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT area_id FROM user_asset_areas WHERE hash = ?")
                .bind(hash)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    /// area -> CIDs the user stores there, for the asset-count dashboard.
    pub async fn area_cid_map(&self, user_id: &str) -> Result<HashMap<String, Vec<String>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT aa.area_id, ua.cid FROM user_asset_areas aa
             INNER JOIN user_assets ua ON ua.hash = aa.hash AND ua.user_id = aa.user_id
             WHERE aa.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (area, cid) in rows {
            map.entry(area).or_default().push(cid);
        }
        Ok(map)
    }

    /// Drops the user's hold on the asset in the given areas; when
    /// `drop_record` is set the asset row goes too and the quota is refunded.
    pub async fn remove_asset(
        &self,
        hash: &str,
        user_id: &str,
        areas: &[String],
        drop_record: bool,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        for area in areas {
            sqlx::query(
                "DELETE FROM user_asset_areas WHERE hash = ? AND user_id = ? AND area_id = ?",
            )
            .bind(hash)
            .bind(user_id)
            .bind(area)
            .execute(&mut *tx)
            .await?;
        }

        if drop_record {
            let size: Option<(i64,)> =
                sqlx::query_as("SELECT total_size FROM user_assets WHERE hash = ? AND user_id = ?")
                    .bind(hash)
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some((size,)) = size {
                sqlx::query("DELETE FROM user_assets WHERE hash = ? AND user_id = ?")
                    .bind(hash)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE users SET used_storage_size = MAX(0, used_storage_size - ?)
                     WHERE username = ?",
                )
                .bind(size)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await
    }

    pub async fn list_assets(
        &self,
        user_id: &str,
        group_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<UserAsset>)> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_assets WHERE user_id = ? AND group_id = ?")
                .bind(user_id)
                .bind(group_id)
                .fetch_one(self.pool())
                .await?;

        let rows = sqlx::query_as::<_, UserAsset>(
            "SELECT * FROM user_assets WHERE user_id = ? AND group_id = ?
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok((total, rows))
    }

    pub async fn rename_asset(&self, user_id: &str, hash: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE user_assets SET asset_name = ? WHERE user_id = ? AND hash = ?")
            .bind(name)
            .bind(user_id)
            .bind(hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn move_asset_to_group(&self, user_id: &str, hash: &str, group_id: i64) -> Result<()> {
        sqlx::query("UPDATE user_assets SET group_id = ? WHERE user_id = ? AND hash = ?")
            .bind(group_id)
            .bind(user_id)
            .bind(hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn mark_shared(&self, user_id: &str, hash: &str) -> Result<()> {
        sqlx::query("UPDATE user_assets SET share_status = 1 WHERE user_id = ? AND hash = ?")
            .bind(user_id)
            .bind(hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn add_visit_count(&self, user_id: &str, hash: &str) -> Result<()> {
        sqlx::query(
            "UPDATE user_assets SET visit_count = visit_count + 1 WHERE user_id = ? AND hash = ?",
        )
        .bind(user_id)
        .bind(hash)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn visit_count(&self, user_id: &str, hash: &str) -> Result<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT visit_count FROM user_assets WHERE user_id = ? AND hash = ?")
                .bind(user_id)
                .bind(hash)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(n,)| n).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// asset groups

impl Db {
    pub async fn create_group(&self, user_id: &str, name: &str, parent: i64) -> Result<AssetGroup> {
        let now = now_rfc3339();
        let result =
            sqlx::query("INSERT INTO asset_groups (user_id, name, parent, created_at) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(name)
                .bind(parent)
                .bind(&now)
                .execute(self.pool())
                .await?;

        Ok(AssetGroup {
            id: result.last_insert_rowid(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            parent,
            created_at: now,
        })
    }

    pub async fn list_groups(
        &self,
        user_id: &str,
        parent: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<AssetGroup>)> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM asset_groups WHERE user_id = ? AND parent = ?")
                .bind(user_id)
                .bind(parent)
                .fetch_one(self.pool())
                .await?;

        let rows = sqlx::query_as::<_, AssetGroup>(
            "SELECT * FROM asset_groups WHERE user_id = ? AND parent = ?
             ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(parent)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok((total, rows))
    }

    /// Deleting a group moves its assets back to the root group.
    pub async fn delete_group(&self, user_id: &str, group_id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("UPDATE user_assets SET group_id = 0 WHERE user_id = ? AND group_id = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE asset_groups SET parent = 0 WHERE user_id = ? AND parent = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM asset_groups WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    pub async fn rename_group(&self, user_id: &str, group_id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE asset_groups SET name = ? WHERE user_id = ? AND id = ?")
            .bind(name)
            .bind(user_id)
            .bind(group_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn move_group(&self, user_id: &str, group_id: i64, parent: i64) -> Result<()> {
        sqlx::query("UPDATE asset_groups SET parent = ? WHERE user_id = ? AND id = ?")
            .bind(parent)
            .bind(user_id)
            .bind(group_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// devices

impl Db {
    pub async fn device_by_id(&self, device_id: &str) -> Result<Option<DeviceInfo>> {
        sqlx::query_as::<_, DeviceInfo>("SELECT * FROM device_infos WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn upsert_device(&self, device: &DeviceInfo) -> Result<()> {
        sqlx::query(
            "INSERT INTO device_infos (device_id, user_id, device_name, bind_status, area_id,
                                       external_ip, ip_country, online, system_version,
                                       created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(device_id) DO UPDATE SET
                device_name = excluded.device_name,
                area_id = excluded.area_id,
                external_ip = excluded.external_ip,
                ip_country = excluded.ip_country,
                online = excluded.online,
                system_version = excluded.system_version,
                updated_at = excluded.updated_at",
        )
        .bind(&device.device_id)
        .bind(&device.user_id)
        .bind(&device.device_name)
        .bind(&device.bind_status)
        .bind(&device.area_id)
        .bind(&device.external_ip)
        .bind(&device.ip_country)
        .bind(device.online)
        .bind(&device.system_version)
        .bind(&device.created_at)
        .bind(&device.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn bind_device(&self, device_id: &str, user_id: &str, name: &str) -> Result<()> {
        sqlx::query(
            "UPDATE device_infos SET user_id = ?, device_name = ?, bind_status = ?, updated_at = ?
             WHERE device_id = ?",
        )
        .bind(user_id)
        .bind(name)
        .bind(BIND_STATUS_BOUND)
        .bind(now_rfc3339())
        .bind(device_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn unbind_device(&self, device_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE device_infos SET user_id = '', bind_status = ?, updated_at = ?
             WHERE device_id = ?",
        )
        .bind(BIND_STATUS_UNBOUND)
        .bind(now_rfc3339())
        .bind(device_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn rename_device(&self, device_id: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE device_infos SET device_name = ?, updated_at = ? WHERE device_id = ?")
            .bind(name)
            .bind(now_rfc3339())
            .bind(device_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn online_device_count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM device_infos WHERE online = 1")
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    pub async fn device_country_counts(&self) -> Result<Vec<(String, i64)>> {
        sqlx::query_as(
            "SELECT ip_country, COUNT(*) FROM device_infos
             WHERE ip_country != '' GROUP BY ip_country ORDER BY COUNT(*) DESC",
        )
        .fetch_all(self.pool())
        .await
    }
}

// ---------------------------------------------------------------------------
// device binding codes

impl Db {
    pub async fn signature_by_hash(&self, hash: &str) -> Result<Option<DeviceSignature>> {
        sqlx::query_as::<_, DeviceSignature>("SELECT * FROM device_signatures WHERE hash = ?")
            .bind(hash)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn insert_signature(
        &self,
        hash: &str,
        username: &str,
        node_id: &str,
        area_id: &str,
        signature: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO device_signatures (hash, username, node_id, area_id, signature, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(hash)
        .bind(username)
        .bind(node_id)
        .bind(area_id)
        .bind(signature)
        .bind(now_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_signature(
        &self,
        hash: &str,
        node_id: &str,
        area_id: &str,
        signature: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE device_signatures SET node_id = ?, area_id = ?, signature = ? WHERE hash = ?",
        )
        .bind(node_id)
        .bind(area_id)
        .bind(signature)
        .bind(hash)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// share links

impl Db {
    pub async fn create_link(&self, link: &NewLink) -> Result<i64> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO share_links (username, cid, short_link, long_link, short_pass, expire_at,
                                      created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&link.username)
        .bind(&link.cid)
        .bind(&link.short_link)
        .bind(&link.long_link)
        .bind(&link.short_pass)
        .bind(&link.expire_at)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn link_by_cid_user(&self, cid: &str, username: &str) -> Result<Option<ShareLink>> {
        sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE cid = ? AND username = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(cid)
        .bind(username)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn link_by_id(&self, id: i64) -> Result<Option<ShareLink>> {
        sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn link_by_long(&self, long_link: &str) -> Result<Option<ShareLink>> {
        sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE long_link = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(long_link)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn long_link_by_cid(&self, cid: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT long_link FROM share_links WHERE cid = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(cid)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(l,)| l))
    }

    pub async fn update_link(&self, id: i64, short_pass: &str, expire_at: &str) -> Result<()> {
        sqlx::query(
            "UPDATE share_links SET short_pass = ?, expire_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(short_pass)
        .bind(expire_at)
        .bind(now_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        Db::connect_memory().await.unwrap()
    }

    fn test_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            user_email: name.to_string(),
            total_storage_size: STARTER_STORAGE_BYTES,
            ..Default::default()
        }
    }

    fn test_asset(user: &str, hash: &str, size: i64) -> NewAsset {
        NewAsset {
            user_id: user.to_string(),
            hash: hash.to_string(),
            cid: format!("cid-{hash}"),
            asset_name: "report.pdf".to_string(),
            asset_type: "file".to_string(),
            total_size: size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn user_lifecycle() {
        let db = test_db().await;
        db.create_user(&test_user("alice@x.io")).await.unwrap();

        let user = db.user_by_username("alice@x.io").await.unwrap().unwrap();
        assert_eq!(user.total_storage_size, STARTER_STORAGE_BYTES);
        assert_eq!(user.used_storage_size, 0);

        db.update_wallet("alice@x.io", "0xabc").await.unwrap();
        db.update_password("alice@x.io", "$2b$12$hash").await.unwrap();

        let user = db.user_by_username("alice@x.io").await.unwrap().unwrap();
        assert_eq!(user.wallet_address, "0xabc");
        assert_eq!(user.pass_hash, "$2b$12$hash");
    }

    #[tokio::test]
    async fn referral_code_lookup() {
        let db = test_db().await;
        db.create_user(&test_user("kol@x.io")).await.unwrap();
        db.insert_referral_code("kol@x.io", "AB12CD").await.unwrap();

        let owner = db.user_by_referral_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(owner.username, "kol@x.io");
        assert_eq!(db.count_referral_codes("kol@x.io").await.unwrap(), 1);
        assert!(db.user_by_referral_code("ZZZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn asset_areas_and_quota() {
        let db = test_db().await;
        db.create_user(&test_user("u@x.io")).await.unwrap();

        let areas = vec!["area-1".to_string(), "area-2".to_string()];
        db.add_asset(&test_asset("u@x.io", "h1", 1000), &areas)
            .await
            .unwrap();

        let user = db.user_by_username("u@x.io").await.unwrap().unwrap();
        assert_eq!(user.used_storage_size, 1000);

        // Re-adding in a new area must not double-charge the quota.
        db.add_asset(&test_asset("u@x.io", "h1", 1000), &["area-3".to_string()])
            .await
            .unwrap();
        let user = db.user_by_username("u@x.io").await.unwrap().unwrap();
        assert_eq!(user.used_storage_size, 1000);

        let missing = db
            .areas_missing_asset("h1", "u@x.io", &["area-1".into(), "area-9".into()])
            .await
            .unwrap();
        assert_eq!(missing, vec!["area-9".to_string()]);

        let mut held = db.areas_holding("h1", "u@x.io").await.unwrap();
        held.sort();
        assert_eq!(held, vec!["area-1", "area-2", "area-3"]);
    }

    #[tokio::test]
    async fn shared_assets_keep_area_copy() {
        let db = test_db().await;
        db.create_user(&test_user("a@x.io")).await.unwrap();
        db.create_user(&test_user("b@x.io")).await.unwrap();

        db.add_asset(&test_asset("a@x.io", "h1", 10), &["area-1".into()])
            .await
            .unwrap();
        db.add_asset(&test_asset("b@x.io", "h1", 10), &["area-1".into()])
            .await
            .unwrap();

        assert!(!db.is_only_holder("h1", "area-1").await.unwrap());

        db.remove_asset("h1", "b@x.io", &["area-1".into()], true)
            .await
            .unwrap();
        assert!(db.is_only_holder("h1", "area-1").await.unwrap());

        let b = db.user_by_username("b@x.io").await.unwrap().unwrap();
        assert_eq!(b.used_storage_size, 0);
        assert!(db.asset_by_hash("h1", "b@x.io").await.unwrap().is_none());
        // a's copy is untouched
        assert!(db.asset_by_hash("h1", "a@x.io").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn groups_release_assets_on_delete() {
        let db = test_db().await;
        db.create_user(&test_user("g@x.io")).await.unwrap();
        let group = db.create_group("g@x.io", "docs", 0).await.unwrap();

        let mut asset = test_asset("g@x.io", "h2", 5);
        asset.group_id = group.id;
        db.add_asset(&asset, &["area-1".into()]).await.unwrap();

        db.delete_group("g@x.io", group.id).await.unwrap();

        let (total, _) = db.list_groups("g@x.io", 0, 50, 0).await.unwrap();
        assert_eq!(total, 0);
        let moved = db.asset_by_hash("h2", "g@x.io").await.unwrap().unwrap();
        assert_eq!(moved.group_id, 0);
    }

    #[tokio::test]
    async fn device_bind_cycle() {
        let db = test_db().await;
        let now = now_rfc3339();
        db.upsert_device(&DeviceInfo {
            device_id: "node-1".into(),
            user_id: String::new(),
            device_name: "edge box".into(),
            bind_status: BIND_STATUS_UNBOUND.into(),
            area_id: "area-1".into(),
            external_ip: "203.0.113.9".into(),
            ip_country: "DE".into(),
            online: true,
            system_version: "1.2.0".into(),
            created_at: now.clone(),
            updated_at: now,
        })
        .await
        .unwrap();

        db.bind_device("node-1", "owner@x.io", "living room").await.unwrap();
        let device = db.device_by_id("node-1").await.unwrap().unwrap();
        assert_eq!(device.user_id, "owner@x.io");
        assert_eq!(device.bind_status, BIND_STATUS_BOUND);

        db.unbind_device("node-1").await.unwrap();
        let device = db.device_by_id("node-1").await.unwrap().unwrap();
        assert_eq!(device.user_id, "");
        assert_eq!(db.online_device_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn share_links_round_trip() {
        let db = test_db().await;
        let id = db
            .create_link(&NewLink {
                username: "s@x.io".into(),
                cid: "cid-1".into(),
                short_link: "/link?cid=cid-1".into(),
                long_link: "https://portal/share/cid-1".into(),
                short_pass: "p4ss".into(),
                expire_at: String::new(),
            })
            .await
            .unwrap();

        let link = db.link_by_id(id).await.unwrap().unwrap();
        assert_eq!(link.short_pass, "p4ss");

        db.update_link(id, "", "2031-01-01T00:00:00+00:00").await.unwrap();
        let link = db.link_by_cid_user("cid-1", "s@x.io").await.unwrap().unwrap();
        assert_eq!(link.short_pass, "");
        assert!(!link.expire_at.is_empty());
        assert_eq!(
            db.long_link_by_cid("cid-1").await.unwrap().as_deref(),
            Some("https://portal/share/cid-1")
        );
    }
}
