//! Lua scripts run with `EVAL`.
//!
//! Each operation is a single script so Redis executes the check and the
//! write without interleaving another client. Lock and ledger keys other
//! than those passed in `KEYS` are derived inside the scripts, which limits
//! this backend to a single Redis node.

/// Helpers shared by the mutating scripts.
macro_rules! lua_helpers {
    () => {
        r#"
        local function now_millis()
            local t = redis.call('time')
            return tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
        end

        local function ledger_key_of(lockKey, lockId, lockPrefix, ledgerPrefix)
            return ledgerPrefix .. string.sub(lockKey, #lockPrefix + 1, #lockKey - #lockId - 1)
        end

        local function find_lock_key(ownerKey, lockId)
            local suffix = ':' .. lockId
            for _, lockKey in ipairs(redis.call('smembers', ownerKey)) do
                if string.sub(lockKey, -#suffix) == suffix then
                    return lockKey
                end
            end
            return nil
        end

        local function release_key(ownerKey, lockKey, owner, lockPrefix, ledgerPrefix)
            local record = redis.call('get', lockKey)
            if not record then
                redis.call('srem', ownerKey, lockKey)
                return 0
            end
            local lock = cjson.decode(record)
            if lock.owner ~= owner then
                return 0
            end
            local ledgerKey = ledger_key_of(lockKey, lock.lock_id, lockPrefix, ledgerPrefix)
            redis.call('del', lockKey)
            redis.call('zrem', ledgerKey, lock.quantity .. ':' .. lock.lock_id)
            redis.call('srem', ownerKey, lockKey)
            return 1
        end
        "#
    };
}

/// KEYS: lock, owner set, ledger.
/// ARGV: record, lease ms, quantity, capacity, ledger member.
/// Returns 1 acquired, 0 over capacity, -1 lock key already present.
pub const ACQUIRE: &str = concat!(
    "redis.replicate_commands()\n",
    lua_helpers!(),
    r#"
    local now = now_millis()
    local ttl = tonumber(ARGV[2])
    local quantity = tonumber(ARGV[3])

    redis.call('zremrangebyscore', KEYS[3], '-inf', now)
    local current = 0
    for _, member in ipairs(redis.call('zrange', KEYS[3], 0, -1)) do
        current = current + tonumber(string.match(member, '^(%d+):'))
    end
    if current + quantity > tonumber(ARGV[4]) then
        return 0
    end

    if not redis.call('set', KEYS[1], ARGV[1], 'PX', ttl, 'NX') then
        return -1
    end

    redis.call('zadd', KEYS[3], now + ttl, ARGV[5])
    if redis.call('pttl', KEYS[3]) < ttl then
        redis.call('pexpire', KEYS[3], ttl)
    end
    redis.call('sadd', KEYS[2], KEYS[1])
    if redis.call('pttl', KEYS[2]) < ttl then
        redis.call('pexpire', KEYS[2], ttl)
    end
    return 1
    "#
);

/// KEYS: owner set.
/// ARGV: lock id, owner, lock prefix, ledger prefix.
/// Returns 1 released, 0 otherwise.
pub const RELEASE: &str = concat!(
    "redis.replicate_commands()\n",
    lua_helpers!(),
    r#"
    local lockKey = find_lock_key(KEYS[1], ARGV[1])
    if not lockKey then
        return 0
    end
    return release_key(KEYS[1], lockKey, ARGV[2], ARGV[3], ARGV[4])
    "#
);

/// KEYS: owner set.
/// ARGV: owner, lock prefix, ledger prefix.
/// Returns the number of locks released.
pub const RELEASE_ALL: &str = concat!(
    "redis.replicate_commands()\n",
    lua_helpers!(),
    r#"
    local released = 0
    for _, lockKey in ipairs(redis.call('smembers', KEYS[1])) do
        released = released + release_key(KEYS[1], lockKey, ARGV[1], ARGV[2], ARGV[3])
    end
    return released
    "#
);

/// KEYS: owner set.
/// ARGV: lock id, owner, additional ms, lock prefix, ledger prefix.
/// Returns the new lease in ms, or 0 if nothing was extended.
pub const EXTEND: &str = concat!(
    "redis.replicate_commands()\n",
    lua_helpers!(),
    r#"
    local lockKey = find_lock_key(KEYS[1], ARGV[1])
    if not lockKey then
        return 0
    end
    local record = redis.call('get', lockKey)
    if not record then
        redis.call('srem', KEYS[1], lockKey)
        return 0
    end
    local lock = cjson.decode(record)
    if lock.owner ~= ARGV[2] then
        return 0
    end
    local remaining = redis.call('pttl', lockKey)
    if remaining <= 0 then
        return 0
    end

    local ledgerKey = ledger_key_of(lockKey, lock.lock_id, ARGV[4], ARGV[5])
    local member = lock.quantity .. ':' .. lock.lock_id
    local score = redis.call('zscore', ledgerKey, member)
    if not score then
        return 0
    end

    local additional = tonumber(ARGV[3])
    local ttl = remaining + additional
    redis.call('pexpire', lockKey, ttl)
    redis.call('zadd', ledgerKey, tonumber(score) + additional, member)
    if redis.call('pttl', ledgerKey) < ttl then
        redis.call('pexpire', ledgerKey, ttl)
    end
    if redis.call('pttl', KEYS[1]) < ttl then
        redis.call('pexpire', KEYS[1], ttl)
    end
    return ttl
    "#
);

/// KEYS: ledger.
/// Returns the quantity held by unexpired ledger entries.
pub const RESERVED: &str = concat!(
    lua_helpers!(),
    r#"
    local total = 0
    for _, member in ipairs(redis.call('zrangebyscore', KEYS[1], '(' .. now_millis(), '+inf')) do
        total = total + tonumber(string.match(member, '^(%d+):'))
    end
    return total
    "#
);

/// KEYS: owner set.
/// Returns `[record, pttl, ...]` for every live lock of the owner; members
/// whose lock key is gone are skipped.
pub const FETCH_BY_OWNER: &str = r#"
    local out = {}
    for _, lockKey in ipairs(redis.call('smembers', KEYS[1])) do
        local record = redis.call('get', lockKey)
        if record then
            local ttl = redis.call('pttl', lockKey)
            if ttl > 0 then
                table.insert(out, record)
                table.insert(out, ttl)
            end
        end
    end
    return out
"#;

/// ARGV: key pattern.
/// Returns `[record, pttl, ...]` for every live lock key matching the pattern.
pub const FETCH_BY_PATTERN: &str = r#"
    local out = {}
    for _, lockKey in ipairs(redis.call('keys', ARGV[1])) do
        local record = redis.call('get', lockKey)
        if record then
            local ttl = redis.call('pttl', lockKey)
            if ttl > 0 then
                table.insert(out, record)
                table.insert(out, ttl)
            end
        end
    end
    return out
"#;
